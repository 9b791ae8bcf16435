use quire::{Document, OpenMode, Result};
use tempfile::tempdir;

mod utils;

#[test]
fn save_and_load_through_the_filesystem() -> Result<()> {
    let _ = env_logger::try_init();
    // Create temporary folder to store file.
    let temp_dir = tempdir()?;
    let file_path = temp_dir.path().join("test_file_roundtrip.pdf");

    let mut doc = utils::create_document();
    let file = doc.save(&file_path)?;
    assert!(file_path.exists());
    assert!(file.metadata()?.len() > 0);

    let loaded = Document::load(&file_path)?;
    assert_eq!(loaded.version, "1.5");
    assert!(loaded.catalog()?.type_is(b"Catalog"));

    let page = loaded.get_object((6, 0))?.as_dict()?;
    let content_id = page.get_reference(b"Contents")?.unwrap();
    let content = loaded.get_object(content_id)?.as_stream()?;
    assert_eq!(content.content, b"BT /F1 48 Tf 100 600 Td (Hello World!) Tj ET");

    Ok(())
}

#[test]
fn open_in_modify_mode_then_save_to_disk() -> Result<()> {
    let _ = env_logger::try_init();
    let temp_dir = tempdir()?;
    let file_path = temp_dir.path().join("test_file_modify.pdf");
    let saved_path = temp_dir.path().join("test_file_modify_saved.pdf");

    utils::create_document().save(&file_path)?;

    let mut doc = Document::open(&file_path, OpenMode::Modify)?;
    doc.add_object(quire::Object::string_literal("added on disk"))?;
    doc.save(&saved_path)?;

    // Modify mode refreshed the file ID before the second save.
    let reloaded = Document::load(&saved_path)?;
    assert!(reloaded.trailer().get_array(b"ID")?.is_some());
    assert!(reloaded.catalog()?.type_is(b"Catalog"));

    Ok(())
}

#[test]
fn loading_a_missing_file_fails_with_an_io_error() {
    let temp_dir = tempdir().unwrap();
    let file_path = temp_dir.path().join("does_not_exist.pdf");
    match Document::load(&file_path) {
        Err(quire::Error::Io(_)) => {}
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

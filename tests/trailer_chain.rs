use quire::{dictionary, Document, OpenMode, OpenOptions};

mod utils;

#[test]
fn single_trailer_documents_are_flattened() {
    let mut doc = utils::create_document();
    let bytes = utils::save_to_vec(&mut doc);

    let reloaded = Document::load_with(bytes, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    assert_eq!(reloaded.trailers.len(), 1);
    // The working table is the single generation's own table.
    assert_eq!(
        reloaded.current_table().all_references(),
        reloaded.trailers[0].xref.all_references()
    );
}

#[test]
fn signed_documents_are_locked_and_preserved_byte_identical() {
    let mut doc = utils::create_document();
    let byte_range = vec![0.into(), 1200.into(), 1400.into(), 200.into()];
    let signature = doc
        .add_object(dictionary! {
            "Type" => "Sig",
            "Filter" => "Adobe.PPKLite",
            "ByteRange" => byte_range,
        })
        .unwrap();
    let catalog_id = doc.trailer().get_reference(b"Root").unwrap().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Sig", signature);

    let bytes = utils::save_to_vec(&mut doc);
    let mut loaded = Document::load_with(bytes.clone(), OpenOptions::new(OpenMode::Modify)).unwrap();

    assert!(loaded.is_read_only());
    assert!(loaded.add_object(quire::Object::Null).is_err());

    let mut out = Vec::new();
    loaded.save_to(&mut out).unwrap();
    assert_eq!(out, bytes, "signed bytes must survive verbatim");
}

#[test]
fn multi_generation_documents_keep_their_chain() {
    let mut doc = utils::create_document();
    let original = utils::save_to_vec(&mut doc);

    let mut loaded = Document::load_with(original, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    loaded.add_object(quire::Object::Null).unwrap();
    let mut updated = Vec::new();
    loaded
        .save_incremental(&mut updated, quire::SaveOptions::default())
        .unwrap();

    // Classic chains with two generations stay as they are.
    let reloaded = Document::load_with(updated, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    assert_eq!(reloaded.trailers.len(), 2);
    assert!(reloaded.trailers[1].dict.get(b"Prev").is_err());
    assert!(reloaded.trailers[0].dict.get(b"Prev").is_ok());
}

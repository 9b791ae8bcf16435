use quire::{dictionary, Document, Object, OpenMode, OpenOptions, SaveOptions, TrailerKind};

mod utils;

#[test]
fn incremental_save_appends_after_the_original_bytes() {
    let mut doc = utils::create_document();
    let original = utils::save_to_vec(&mut doc);

    let mut loaded = Document::load_with(original.clone(), OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    loaded
        .set_object(
            (1, 0),
            dictionary! {
                "Title" => Object::string_literal("Amended title"),
            },
        )
        .unwrap();

    let mut out = Vec::new();
    loaded.save_incremental(&mut out, SaveOptions::default()).unwrap();

    assert!(out.starts_with(&original), "the original bytes must stay untouched");
    assert!(out.len() > original.len());

    let appended = String::from_utf8_lossy(&out[original.len()..]);
    assert!(appended.contains("1 0 obj"), "the amended object is rewritten");
    assert!(!appended.contains("3 0 obj"), "unchanged objects are not rewritten");
    assert!(appended.contains("/Prev"));

    let reloaded = Document::load_with(out, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    assert_eq!(reloaded.trailers.len(), 2);
    let info = reloaded.get_object((1, 0)).unwrap().as_dict().unwrap();
    assert_eq!(info.get_string(b"Title").unwrap(), b"Amended title");
}

#[test]
fn incremental_update_keeps_the_chain_form() {
    let mut doc = utils::create_document();
    let options = SaveOptions::builder().use_xref_streams(true).build();
    let mut bytes = Vec::new();
    doc.save_with_options(&mut bytes, options).unwrap();

    let mut loaded = Document::load_with(bytes, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    let extra = loaded.add_object(Object::string_literal("added later")).unwrap();
    let mut out = Vec::new();
    loaded.save_incremental(&mut out, SaveOptions::default()).unwrap();

    // A stream-form document continues with a stream-form update section.
    let reloaded = Document::load_with(out, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    assert_eq!(reloaded.trailers.len(), 2);
    assert_eq!(reloaded.trailers[0].kind, TrailerKind::CrossReferenceStream);
    assert_eq!(
        reloaded.get_object(extra).unwrap(),
        &Object::string_literal("added later")
    );
}

#[test]
fn repeated_incremental_saves_grow_the_chain() {
    let mut doc = utils::create_document();
    let original = utils::save_to_vec(&mut doc);

    let mut loaded = Document::load_with(original, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    let first = loaded.add_object(Object::Integer(1)).unwrap();
    let mut second_bytes = Vec::new();
    loaded.save_incremental(&mut second_bytes, SaveOptions::default()).unwrap();

    let second = loaded.add_object(Object::Integer(2)).unwrap();
    let mut third_bytes = Vec::new();
    loaded.save_incremental(&mut third_bytes, SaveOptions::default()).unwrap();
    assert!(third_bytes.starts_with(&second_bytes));

    let reloaded = Document::load_with(third_bytes, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    assert_eq!(reloaded.trailers.len(), 3);
    assert_eq!(reloaded.get_object(first).unwrap(), &Object::Integer(1));
    assert_eq!(reloaded.get_object(second).unwrap(), &Object::Integer(2));
}

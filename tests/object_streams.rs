use quire::{dictionary, Document, Object, OpenMode, OpenOptions, SaveOptions};

mod utils;

fn objstm_options() -> SaveOptions {
    SaveOptions::builder().use_object_streams(true).build()
}

#[test]
fn compressible_objects_land_in_object_streams() {
    let mut doc = utils::create_document();
    let bytes = utils::save_with_options_to_vec(&mut doc, objstm_options());

    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Type /ObjStm"));

    let reloaded = Document::load_with(bytes, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    assert!(reloaded.catalog().unwrap().type_is(b"Catalog"));
    // A compressed member survives with its content.
    let info = reloaded.get_object((1, 0)).unwrap().as_dict().unwrap();
    assert_eq!(info.get_string(b"Title").unwrap(), b"Integration fixture");
    // The content stream stayed top level.
    let page = reloaded.get_object((6, 0)).unwrap().as_dict().unwrap();
    let content_id = page.get_reference(b"Contents").unwrap().unwrap();
    assert!(reloaded.get_object(content_id).unwrap().as_stream().is_ok());
    // Its container is registered with the owning trailer.
    assert!(!reloaded.trailers[0].object_streams.is_empty());
}

#[test]
fn overflowing_the_member_cap_chains_streams() {
    let mut doc = utils::create_document();
    let mut kids = Vec::new();
    for index in 0..120 {
        let id = doc
            .add_object(dictionary! { "Index" => index as i64 })
            .unwrap();
        kids.push(Object::Reference(id));
    }
    // Keep them reachable.
    let holder = doc.add_object(Object::Array(kids)).unwrap();
    let catalog_id = doc.trailer().get_reference(b"Root").unwrap().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Extra", holder);

    let bytes = utils::save_with_options_to_vec(&mut doc, objstm_options());
    let reloaded = Document::load_with(bytes, OpenOptions::new(OpenMode::ReadOnly)).unwrap();

    let containers: Vec<&quire::Stream> = reloaded
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| stream.dict.type_is(b"ObjStm"))
        .collect();
    assert!(containers.len() >= 2, "expected chained containers");
    let with_extends = containers
        .iter()
        .filter(|stream| stream.dict.has(b"Extends"))
        .count();
    assert_eq!(with_extends, containers.len() - 1);

    // All members resolve after the reload.
    for object in reloaded.objects.values() {
        if let Ok(dict) = object.as_dict() {
            if dict.has(b"Index") {
                assert!(dict.get_integer(b"Index").is_ok());
            }
        }
    }
}

#[test]
fn custom_member_cap_is_honored() {
    let mut doc = utils::create_document();
    let options = SaveOptions::builder()
        .use_object_streams(true)
        .max_objects_per_stream(3)
        .build();
    let bytes = utils::save_with_options_to_vec(&mut doc, options);
    let reloaded = Document::load_with(bytes, OpenOptions::new(OpenMode::ReadOnly)).unwrap();
    for object in reloaded.objects.values() {
        if let Ok(stream) = object.as_stream() {
            if stream.dict.type_is(b"ObjStm") {
                assert!(stream.dict.get_integer(b"N").unwrap() <= 3);
            }
        }
    }
}

use quire::{dictionary, Document, Object, SaveOptions, Stream};

/// Create and return a document for testing.
#[allow(dead_code)]
pub fn create_document() -> Document {
    let mut doc = Document::with_version("1.5");
    let info_id = doc
        .add_object(dictionary! {
            "Title" => Object::string_literal("Integration fixture"),
            "Producer" => Object::string_literal("quire"),
        })
        .unwrap();
    let pages_id = doc.new_object_id();
    let font_id = doc
        .add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        })
        .unwrap();
    let resources_id = doc
        .add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        })
        .unwrap();
    let content_id = doc
        .add_object(Stream::new(
            dictionary! {},
            b"BT /F1 48 Tf 100 600 Td (Hello World!) Tj ET".to_vec(),
        ))
        .unwrap();
    let page_id = doc
        .add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        })
        .unwrap();
    doc.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        },
    )
    .unwrap();
    let catalog_id = doc
        .add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        })
        .unwrap();
    doc.trailer_mut().set("Root", catalog_id);
    doc.trailer_mut().set("Info", info_id);
    doc
}

#[allow(dead_code)]
pub fn save_to_vec(doc: &mut Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[allow(dead_code)]
pub fn save_with_options_to_vec(doc: &mut Document, options: SaveOptions) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_with_options(&mut out, options).unwrap();
    out
}

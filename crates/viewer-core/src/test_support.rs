use lopdf::{dictionary, Document, Object};

use crate::upload::{UploadedFile, PDF_MIME};

/// Uncompressed US Letter document with `pages` blank pages
pub fn letter_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("test document should serialize");
    buffer
}

pub fn pdf_upload(name: &str, pages: usize) -> UploadedFile {
    UploadedFile::new(name, PDF_MIME, letter_pdf(pages))
}

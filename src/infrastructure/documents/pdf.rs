use crate::domain::error::{AppError, Result};

/// Number of pages in a PDF held in memory. Fails when the bytes are not a
/// readable PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::ParseError(format!("Printed output is not a valid PDF: {}", e)))?;
    Ok(document.get_pages().len())
}

/// Minimal single-page PDF for tests.
#[cfg(test)]
pub(crate) fn one_page_pdf() -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&one_page_pdf()).unwrap(), 1);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(page_count(b"<html>not a pdf</html>").is_err());
    }
}

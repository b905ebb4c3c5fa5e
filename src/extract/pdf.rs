//! PDF text layer extraction using lopdf.

use lopdf::Document as PdfDocument;
use tracing::{debug, warn};

use super::ExtractionError;

/// Read the text layer of every page, in page order.
///
/// Each text run is percent-decoded when it decodes cleanly, runs on a page
/// are joined with a single space and every page ends with a newline. A page
/// whose content cannot be read contributes nothing. Returns the raw text and
/// the page count.
pub(super) fn extract_pdf_text(bytes: &[u8]) -> Result<(String, u32), ExtractionError> {
    let document = PdfDocument::load_mem(bytes)
        .map_err(|e| ExtractionError::ExtractionFailed(format!("failed to load PDF: {}", e)))?;

    if document.is_encrypted() {
        return Err(ExtractionError::ExtractionFailed(
            "PDF is encrypted".to_string(),
        ));
    }

    // BTreeMap keys, already in page-number order
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let page_count = page_numbers.len() as u32;

    let mut text = String::new();
    for page in page_numbers {
        match document.extract_text(&[page]) {
            Ok(page_text) => {
                let runs: Vec<String> = page_text
                    .lines()
                    .map(str::trim)
                    .filter(|run| !run.is_empty())
                    .map(decode_run)
                    .collect();
                text.push_str(&runs.join(" "));
                text.push('\n');
            }
            Err(e) => {
                warn!("Skipping unreadable PDF page {}: {}", page, e);
            }
        }
    }

    debug!("Read {} PDF pages ({} raw chars)", page_count, text.len());
    Ok((text, page_count))
}

/// Percent-decode a text run, keeping the raw run if it is not valid
/// percent-encoding.
fn decode_run(run: &str) -> String {
    match urlencoding::decode(run) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => run.to_string(),
    }
}

/// Build a minimal PDF whose pages each show the given text runs.
#[cfg(test)]
pub(crate) fn build_test_pdf(pages: &[&[&str]]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids: Vec<Object> = Vec::new();
    for runs in pages {
        let mut operations = Vec::new();
        let mut y = 700;
        for run in runs.iter() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![72.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*run)]));
            operations.push(Operation::new("ET", vec![]));
            y -= 20;
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

#[cfg(test)]
mod tests {
    use super::super::{ExtractionMethod, TextExtractor};
    use super::*;

    #[test]
    fn test_runs_keep_order_across_pages() {
        let pdf = build_test_pdf(&[
            &["Welcome to the call", "Revenue grew 12%"],
            &["Margins held steady"],
        ]);

        let result = TextExtractor::new()
            .extract(&pdf, "application/pdf", "q3.pdf")
            .unwrap();

        assert_eq!(result.method, ExtractionMethod::PdfText);
        assert_eq!(result.page_count, Some(2));
        assert_eq!(
            result.text,
            "Welcome to the call Revenue grew 12% Margins held steady"
        );
    }

    #[test]
    fn test_page_without_text_is_empty() {
        let pdf = build_test_pdf(&[&[]]);
        let result = TextExtractor::new()
            .extract(&pdf, "application/pdf", "scan.pdf")
            .unwrap();
        assert_eq!(result.page_count, Some(1));
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_percent_encoded_runs_are_decoded() {
        assert_eq!(decode_run("Q3%20results"), "Q3 results");
        assert_eq!(decode_run("up 5%"), "up 5%");
        assert_eq!(decode_run("bad %FF byte"), "bad %FF byte");
    }
}

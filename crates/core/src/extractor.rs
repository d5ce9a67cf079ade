use crate::error::IngestError;
use lopdf::Document;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Extract the text of every page, in page order. Pages without text are
    /// returned with an empty string.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Join page texts into one document string, one trailing newline per
/// non-empty page.
pub fn join_page_texts(pages: &[PageText]) -> String {
    let mut joined = String::new();
    for page in pages {
        if page.text.is_empty() {
            continue;
        }
        joined.push_str(&page.text);
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pdf_with_pages;

    #[test]
    fn extracts_text_per_page() {
        let pdf = pdf_with_pages(&["Hydraulic pump manual", "Second page"]);

        let pages = LopdfExtractor.extract_pages(&pdf).expect("pdf should parse");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Hydraulic pump manual"));
        assert!(pages[1].text.contains("Second page"));
    }

    #[test]
    fn image_only_page_has_blank_text() {
        let pdf = pdf_with_pages(&[""]);

        let pages = LopdfExtractor.extract_pages(&pdf).expect("pdf should parse");

        assert_eq!(pages.len(), 1);
        assert!(pages[0].text.trim().is_empty());
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = LopdfExtractor.extract_pages(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[test]
    fn page_texts_are_joined_with_newlines() {
        let pages = vec![
            PageText {
                number: 1,
                text: "one".to_string(),
            },
            PageText {
                number: 2,
                text: String::new(),
            },
            PageText {
                number: 3,
                text: "three".to_string(),
            },
        ];
        assert_eq!(join_page_texts(&pages), "one\nthree\n");
    }
}

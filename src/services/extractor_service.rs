use crate::error::{Error, Result};

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const MIN_EXTRACTED_CHARS: usize = 50;

/// Page-by-page access to a document's text.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Raw text of a page. Pages are numbered from 1.
    fn page_text(&self, page_number: usize) -> Result<String>;
}

pub struct PdfPages {
    document: lopdf::Document,
    page_numbers: Vec<u32>,
}

impl PdfPages {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let document = lopdf::Document::load_mem(bytes).map_err(|e| {
            tracing::warn!("Failed to parse PDF document: {}", e);
            Error::FileReadFailure("the document is damaged or encrypted".to_string())
        })?;
        let page_numbers = document.get_pages().keys().copied().collect();
        Ok(Self {
            document,
            page_numbers,
        })
    }
}

impl PageSource for PdfPages {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, page_number: usize) -> Result<String> {
        let number = page_number
            .checked_sub(1)
            .and_then(|idx| self.page_numbers.get(idx))
            .copied()
            .ok_or_else(|| Error::Internal(format!("Page {} is out of range", page_number)))?;

        self.document.extract_text(&[number]).map_err(|e| {
            tracing::warn!("Failed to extract text from page {}: {}", number, e);
            Error::FileReadFailure(format!("page {} could not be read", page_number))
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExtractorService {
    max_pages: Option<usize>,
}

impl ExtractorService {
    pub fn new(max_pages: Option<usize>) -> Self {
        Self { max_pages }
    }

    /// Validates an uploaded file and extracts its text, reporting progress
    /// (0-100) after every page.
    pub fn extract_document(
        &self,
        mime_type: &str,
        bytes: &[u8],
        progress: impl FnMut(u8),
    ) -> Result<String> {
        if !is_pdf_mime(mime_type) {
            return Err(Error::InvalidFileType);
        }
        if !bytes.starts_with(b"%PDF") {
            return Err(Error::InvalidFileType);
        }

        let pages = PdfPages::load(bytes)?;
        tracing::info!("Extracting text from PDF with {} pages", pages.page_count());
        self.extract_pages(&pages, progress)
    }

    pub fn extract_pages<S>(&self, source: &S, mut progress: impl FnMut(u8)) -> Result<String>
    where
        S: PageSource + ?Sized,
    {
        let available = source.page_count();
        let total = self.max_pages.map_or(available, |cap| available.min(cap));

        let mut full_text = String::new();
        for page in 1..=total {
            let raw = source.page_text(page)?;
            full_text.push_str(&join_text_items(&raw));
            full_text.push('\n');
            progress(percent(page, total));
        }

        let meaningful = full_text.trim().chars().count();
        if meaningful < MIN_EXTRACTED_CHARS {
            tracing::info!("Extracted text too short: {} characters", meaningful);
            return Err(Error::InsufficientText);
        }

        Ok(full_text)
    }
}

fn is_pdf_mime(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MIME_TYPE))
        .unwrap_or(false)
}

// Text items of a page are joined with single spaces.
fn join_text_items(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn percent(done: usize, total: usize) -> u8 {
    ((done as f64 / total as f64) * 100.0).round() as u8
}

//! PDF text extraction
//!
//! `pdf-extract` handles most files. It can hang on unusual fonts and panics
//! on some malformed input, so it runs on its own thread with a deadline and
//! falls back to lopdf's simpler extractor.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF-";

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Text and page count of one PDF
#[derive(Debug, Clone, PartialEq)]
pub struct PdfText {
    pub text: String,
    pub pages: Option<u32>,
}

/// True when `path` has a `.pdf` extension or `bytes` start with the PDF header
pub fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
        || path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
}

/// Extract the text of a PDF held in memory
///
/// Fails when neither extractor finds any text (scanned or encrypted files).
pub fn extract(path: &Path, bytes: &[u8]) -> Result<PdfText> {
    let raw = extract_with_timeout(path, bytes)?;
    let text = clean(&raw);
    if text.is_empty() {
        return Err(Error::loader(path, "no text could be extracted from PDF"));
    }

    let pages = lopdf::Document::load_mem(bytes)
        .ok()
        .map(|doc| doc.get_pages().len() as u32);

    Ok(PdfText { text, pages })
}

fn extract_with_timeout(path: &Path, bytes: &[u8]) -> Result<String> {
    let data = bytes.to_vec();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
    });

    match rx.recv_timeout(EXTRACT_TIMEOUT) {
        Ok(Ok(text)) if !text.trim().is_empty() => {
            let _ = handle.join();
            Ok(text)
        }
        Ok(Ok(_)) => {
            let _ = handle.join();
            tracing::debug!("pdf-extract found no text in {}, trying lopdf", path.display());
            extract_fallback(path, bytes)
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", path.display(), e);
            extract_fallback(path, bytes)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!(
                "pdf-extract timed out after {:?} on {}, trying lopdf",
                EXTRACT_TIMEOUT,
                path.display()
            );
            extract_fallback(path, bytes)
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("pdf-extract crashed on {}, trying lopdf", path.display());
            extract_fallback(path, bytes)
        }
    }
}

fn extract_fallback(path: &Path, bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::loader(path, format!("cannot parse PDF: {}", e)))?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
        .map_err(|e| Error::loader(path, format!("cannot extract PDF text: {}", e)))
}

/// Drop NUL bytes and blank lines, trim every line
fn clean(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

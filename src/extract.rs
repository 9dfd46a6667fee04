//! Text extraction from document files.
//!
//! Extraction is a collaborator of the processing pipeline, injected as a
//! trait object so tests can substitute stubs and so no converter state
//! lives in process-global statics. Failures are reported as `None` and
//! recorded as missing content — they never abort a scan.

use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts text content from a file. Called once per newly-identified
/// document, and again on later scans while content is still missing.
pub trait Extract: Send + Sync {
    /// Returns the extracted text, or `None` when extraction fails or the
    /// format is unsupported.
    fn extract(&self, path: &Path) -> Option<String>;
}

/// Default extractor, dispatching on file extension: plain reads for text
/// formats, `pdf-extract` for PDF, OOXML `w:t` runs for DOCX.
#[derive(Debug, Default)]
pub struct DocumentExtractor;

impl Extract for DocumentExtractor {
    fn extract(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let result = match ext.as_str() {
            "txt" | "md" | "html" | "htm" => std::fs::read_to_string(path).ok(),
            "pdf" => extract_pdf(path),
            "docx" => extract_docx(path),
            _ => None,
        };
        if result.is_none() {
            debug!(path = %path.display(), "content extraction failed");
        }
        result
    }
}

fn extract_pdf(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    pdf_extract::extract_text_from_mem(&bytes).ok()
}

fn extract_docx(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice())).ok()?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive.by_name("word/document.xml").ok()?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .ok()?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return None;
        }
    }
    extract_w_t_elements(&doc_xml)
}

/// Collect the text of all `w:t` runs in a DOCX body.
fn extract_w_t_elements(xml: &[u8]) -> Option<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
    Some(out)
}

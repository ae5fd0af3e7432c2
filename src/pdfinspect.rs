use lopdf::{Document as LoDocument, Object as LoObject};

use crate::types::PT_TO_MM;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEmptyOrNoPages,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEmptyOrNoPages => "PDF_EMPTY_OR_NO_PAGES",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

/// What a produced sheet looks like when read back.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub file_size_bytes: usize,
    /// Media box of the first page, in millimetres.
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub title: Option<String>,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    let pages = pdf.get_pages();
    let Some(first_page) = pages.values().next().copied() else {
        return Err(PdfInspectError {
            code: PdfInspectErrorCode::PdfEmptyOrNoPages,
            message: "pdf has no pages".to_string(),
        });
    };
    let (page_width_mm, page_height_mm) = media_box_mm(&pdf, first_page).ok_or_else(|| {
        PdfInspectError {
            code: PdfInspectErrorCode::PdfParseFailed,
            message: "first page has no readable /MediaBox".to_string(),
        }
    })?;

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        file_size_bytes: bytes.len(),
        page_width_mm,
        page_height_mm,
        title: document_title(&pdf),
    })
}

fn media_box_mm(pdf: &LoDocument, page_id: lopdf::ObjectId) -> Option<(f64, f64)> {
    let page = pdf.get_dictionary(page_id).ok()?;
    let media_box = page.get(b"MediaBox").and_then(LoObject::as_array).ok()?;
    let values: Vec<f64> = media_box
        .iter()
        .filter_map(|v| match v {
            LoObject::Integer(value) => Some(*value as f64),
            LoObject::Real(value) => Some(*value as f64),
            _ => None,
        })
        .collect();
    if values.len() != 4 {
        return None;
    }
    Some((
        (values[2] - values[0]) * PT_TO_MM,
        (values[3] - values[1]) * PT_TO_MM,
    ))
}

fn document_title(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_dictionary(info_id).ok()?;
    let raw = info.get(b"Title").ok()?.as_str().ok()?;
    Some(raw.iter().map(|b| *b as char).collect())
}

//! Conversion types and the extension-to-conversion table.
//!
//! The table is closed: every [`ConversionType`] maps to exactly one
//! source extension and target format, and extensions not listed map to
//! no conversions at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConversionType
// ---------------------------------------------------------------------------

/// A server-side conversion the client may request.
///
/// Serialized with the wire name expected by the upload endpoint's
/// `conversion_type` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionType {
    CsvToJson,
    CsvToXlsx,
    XlsxToCsv,
    TxtToPdf,
    PdfToText,
    DocxToPdf,
    DocxToMarkdown,
}

impl ConversionType {
    /// Every conversion type, in table order.
    pub const ALL: [ConversionType; 7] = [
        ConversionType::CsvToJson,
        ConversionType::CsvToXlsx,
        ConversionType::XlsxToCsv,
        ConversionType::TxtToPdf,
        ConversionType::PdfToText,
        ConversionType::DocxToPdf,
        ConversionType::DocxToMarkdown,
    ];

    /// Wire name, e.g. `csv_to_json`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CsvToJson => "csv_to_json",
            Self::CsvToXlsx => "csv_to_xlsx",
            Self::XlsxToCsv => "xlsx_to_csv",
            Self::TxtToPdf => "txt_to_pdf",
            Self::PdfToText => "pdf_to_text",
            Self::DocxToPdf => "docx_to_pdf",
            Self::DocxToMarkdown => "docx_to_markdown",
        }
    }

    /// Human-readable label for selection lists.
    pub fn label(self) -> &'static str {
        match self {
            Self::CsvToJson => "CSV → JSON",
            Self::CsvToXlsx => "CSV → Excel (.xlsx)",
            Self::XlsxToCsv => "Excel → CSV",
            Self::TxtToPdf => "Text → PDF",
            Self::PdfToText => "PDF → Text",
            Self::DocxToPdf => "Word → PDF",
            Self::DocxToMarkdown => "Word → Markdown",
        }
    }

    /// Canonical source extension. `xls` files also use [`Self::XlsxToCsv`].
    pub fn source_extension(self) -> &'static str {
        match self {
            Self::CsvToJson | Self::CsvToXlsx => "csv",
            Self::XlsxToCsv => "xlsx",
            Self::TxtToPdf => "txt",
            Self::PdfToText => "pdf",
            Self::DocxToPdf | Self::DocxToMarkdown => "docx",
        }
    }

    /// Format of the produced file.
    pub fn target_format(self) -> &'static str {
        match self {
            Self::CsvToJson => "json",
            Self::CsvToXlsx => "xlsx",
            Self::XlsxToCsv => "csv",
            Self::TxtToPdf | Self::DocxToPdf => "pdf",
            Self::PdfToText => "txt",
            Self::DocxToMarkdown => "md",
        }
    }
}

impl fmt::Display for ConversionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`ConversionType::from_str`] for unknown wire names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown conversion type: {0}")]
pub struct ParseConversionTypeError(pub String);

impl FromStr for ConversionType {
    type Err = ParseConversionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseConversionTypeError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Extension table
// ---------------------------------------------------------------------------

const CSV_CONVERSIONS: &[ConversionType] = &[ConversionType::CsvToJson, ConversionType::CsvToXlsx];
const SPREADSHEET_CONVERSIONS: &[ConversionType] = &[ConversionType::XlsxToCsv];
const TEXT_CONVERSIONS: &[ConversionType] = &[ConversionType::TxtToPdf];
const PDF_CONVERSIONS: &[ConversionType] = &[ConversionType::PdfToText];
const WORD_CONVERSIONS: &[ConversionType] =
    &[ConversionType::DocxToPdf, ConversionType::DocxToMarkdown];

/// Lower-cased extension of `filename`: the text after the last `.`.
///
/// Returns `None` when there is no `.` or nothing follows it.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Conversions legal for an already lower-cased extension.
pub fn conversions_for_extension(extension: &str) -> &'static [ConversionType] {
    match extension {
        "csv" => CSV_CONVERSIONS,
        "xlsx" | "xls" => SPREADSHEET_CONVERSIONS,
        "txt" => TEXT_CONVERSIONS,
        "pdf" => PDF_CONVERSIONS,
        "docx" => WORD_CONVERSIONS,
        _ => &[],
    }
}

/// Conversions legal for `filename`, in display order.
///
/// Empty for unknown or missing extensions.
pub fn legal_conversions(filename: &str) -> &'static [ConversionType] {
    match file_extension(filename) {
        Some(ext) => conversions_for_extension(&ext),
        None => &[],
    }
}

/// Whether `conversion` may be requested for `filename`.
pub fn is_legal(filename: &str, conversion: ConversionType) -> bool {
    legal_conversions(filename).contains(&conversion)
}

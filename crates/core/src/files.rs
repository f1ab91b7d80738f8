//! Files going up (conversion requests) and coming back (job receipts and
//! the processed-file listing).

use serde::{Deserialize, Serialize};

use crate::conversion::{self, ConversionType};
use crate::error::ConversionError;
use crate::types::{JobId, Timestamp};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// Source file
// ---------------------------------------------------------------------------

/// A file selected for conversion: original name plus its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Original file name, as uploaded.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        conversion::file_extension(&self.name)
    }

    /// Conversions the service accepts for this file.
    pub fn legal_conversions(&self) -> &'static [ConversionType] {
        conversion::legal_conversions(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Conversion request
// ---------------------------------------------------------------------------

/// A validated pairing of a source file and a conversion type.
///
/// Can only be built for legal pairings, so holding one proves the
/// request may be sent.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    file: &'a SourceFile,
    conversion_type: ConversionType,
}

impl<'a> ConversionRequest<'a> {
    pub fn new(
        file: &'a SourceFile,
        conversion_type: ConversionType,
    ) -> Result<Self, ConversionError> {
        if !file.legal_conversions().contains(&conversion_type) {
            return Err(ConversionError::validation(
                "Conversion not supported for this file type",
            ));
        }
        Ok(Self {
            file,
            conversion_type,
        })
    }

    pub fn file(&self) -> &'a SourceFile {
        self.file
    }

    pub fn conversion_type(&self) -> ConversionType {
        self.conversion_type
    }
}

// ---------------------------------------------------------------------------
// Job handle
// ---------------------------------------------------------------------------

/// Receipt for an accepted upload.
///
/// Not tracked further on the client; later state arrives over the push
/// channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub job_id: JobId,
    pub initial_status: String,
    pub server_message: String,
}

// ---------------------------------------------------------------------------
// Processed files
// ---------------------------------------------------------------------------

/// One converted file currently downloadable from the service.
///
/// The server expires these on its own (24h retention); the client only
/// ever replaces its whole list with a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFileEntry {
    pub filename: String,
    pub extension: Option<String>,
    pub size_bytes: u64,
    pub size_megabytes: f64,
    pub modified_at: Option<Timestamp>,
    pub download_url: String,
}

/// Listing entry as the service sends it.
///
/// `size_mb` is ignored; the size in megabytes is recomputed from
/// `size_bytes`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileListItem {
    pub filename: String,
    #[serde(default)]
    pub extension: Option<String>,
    pub size_bytes: u64,
    #[serde(default)]
    pub modified_at: Option<Timestamp>,
    pub download_url: String,
}

impl From<FileListItem> for ProcessedFileEntry {
    fn from(item: FileListItem) -> Self {
        Self {
            size_megabytes: size_megabytes(item.size_bytes),
            filename: item.filename,
            extension: item.extension,
            size_bytes: item.size_bytes,
            modified_at: item.modified_at,
            download_url: item.download_url,
        }
    }
}

/// Size in MiB rounded to two decimals.
pub fn size_megabytes(size_bytes: u64) -> f64 {
    (size_bytes as f64 / BYTES_PER_MEGABYTE * 100.0).round() / 100.0
}

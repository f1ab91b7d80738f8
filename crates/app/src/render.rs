//! Plain-text rendering for the terminal boundary.

use fileconv_core::conversion::ConversionType;
use fileconv_core::files::ProcessedFileEntry;
use fileconv_core::notice::{Notice, NoticeLevel};

/// One line per notice, with its description indented below.
pub fn notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
    };
    match &notice.description {
        Some(description) => format!("[{tag}] {}\n       {description}", notice.message),
        None => format!("[{tag}] {}", notice.message),
    }
}

pub fn conversions(file_name: &str, legal: &[ConversionType]) -> String {
    if legal.is_empty() {
        return format!("No conversions available for {file_name}");
    }
    legal
        .iter()
        .map(|c| format!("{:<16}{}", c.as_str(), c.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Listing table: name, size, modification time, download URL.
pub fn listing(files: &[ProcessedFileEntry]) -> String {
    if files.is_empty() {
        return "No converted files available".to_string();
    }
    files
        .iter()
        .map(|f| {
            let modified = f
                .modified_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{:<32} {:>8.2} MB  {:<16}  {}",
                f.filename, f.size_megabytes, modified, f.download_url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

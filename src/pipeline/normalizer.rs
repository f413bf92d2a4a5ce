// The `normalizer` module builds an information-bearing filename from an
// extracted record and renames the downloaded file in place.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use super::record::StructuredRecord;

/// Removes every character that is not alphanumeric, space, hyphen, or
/// underscore, then trims trailing whitespace.
///
/// Sanitization may empty a segment entirely (a vendor name of `"株式会社"`
/// survives, `"!!!"` does not); empty segments are accepted as-is rather
/// than substituted with a placeholder, so the remaining segments still
/// identify the document.
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Composes `{date}_{vendor}_{id}{ext}`, preserving the original extension.
pub fn normalized_name(record: &StructuredRecord, original: &Path) -> String {
    let extension = original
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "{}_{}_{}{}",
        record.document_date(),
        sanitize_component(record.vendor_name()),
        sanitize_component(record.document_id()),
        extension
    )
}

/// Renames `path` in place to the normalized filename.
///
/// The rename is destructive: on success the old path is gone and the new
/// one is returned. On any failure the error is logged and the original
/// path is returned unchanged, so the caller always holds a valid handle.
pub async fn apply(record: &StructuredRecord, path: &Path) -> PathBuf {
    let target = path.with_file_name(normalized_name(record, path));
    match fs::rename(path, &target).await {
        Ok(()) => {
            info!(from = %path.display(), to = %target.display(), "Renamed attachment");
            target
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Rename failed, keeping original name");
            path.to_path_buf()
        }
    }
}

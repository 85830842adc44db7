//! Local checks on a file before it enters the pipeline.

use std::path::Path;

use crate::config::UploadLimits;
use crate::contract::FileSource;
use crate::error::ValidationError;

/// Check size, MIME type and extension of `file` against `limits`.
pub fn validate_file(file: &FileSource, limits: &UploadLimits) -> Result<(), ValidationError> {
    let size = file.size_bytes();
    if size > limits.max_file_size {
        return Err(ValidationError::TooLarge {
            file: file.name.clone(),
            size,
            limit: limits.max_file_size,
        });
    }

    if !limits.allowed_mime_types.is_empty()
        && !limits
            .allowed_mime_types
            .iter()
            .any(|pattern| mime_matches(pattern, &file.mime_type))
    {
        return Err(ValidationError::DisallowedType {
            file: file.name.clone(),
            mime_type: file.mime_type.clone(),
        });
    }

    if !limits.allowed_extensions.is_empty() {
        let allowed = extension_of(&file.name)
            .map(|ext| {
                limits
                    .allowed_extensions
                    .iter()
                    .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false);
        if !allowed {
            return Err(ValidationError::DisallowedExtension {
                file: file.name.clone(),
            });
        }
    }

    Ok(())
}

/// `pattern` is either an exact type or `type/*`. Parameters such as
/// `; charset=utf-8` on the candidate are ignored.
pub fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let pattern = pattern.trim().to_ascii_lowercase();
    if pattern == "*" || pattern == "*/*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(top_level) => essence
            .split_once('/')
            .map(|(t, _)| t == top_level)
            .unwrap_or(false),
        None => essence == pattern,
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

//! Utility functions for S3 paths, key-to-path mapping and collision handling

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Split an `s3://bucket/prefix` URL into bucket and prefix
///
/// A URL without a prefix yields an empty prefix.
///
/// # Examples
///
/// ```
/// use prefix_retriever::utils::parse_s3_path;
///
/// let (bucket, prefix) = parse_s3_path("s3://logs/year=2024/").unwrap();
/// assert_eq!(bucket, "logs");
/// assert_eq!(prefix, "year=2024/");
/// ```
pub fn parse_s3_path(s3_path: &str) -> Result<(String, String)> {
    let rest = s3_path.strip_prefix("s3://").ok_or_else(|| Error::InvalidPath {
        path: PathBuf::from(s3_path),
        reason: "S3 path must start with 's3://'".to_string(),
    })?;

    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(Error::InvalidPath {
            path: PathBuf::from(s3_path),
            reason: "S3 path has no bucket name".to_string(),
        });
    }
    Ok((bucket.to_string(), prefix.to_string()))
}

/// Map an object key onto a relative filesystem path
///
/// Each delimiter-separated segment becomes one path component. Keys that
/// would escape the output directory (`..`, absolute paths) or that name a
/// folder rather than an object are rejected.
pub fn key_to_relative_path(key: &str, delimiter: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::InvalidPath {
        path: PathBuf::from(key),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if !delimiter.is_empty() && key.ends_with(delimiter) {
        return Err(invalid("key names a folder marker"));
    }

    let mut path = PathBuf::new();
    let segments: Box<dyn Iterator<Item = &str>> = if delimiter.is_empty() {
        Box::new(std::iter::once(key))
    } else {
        Box::new(key.split(delimiter))
    };
    for segment in segments.filter(|s| !s.is_empty()) {
        let segment_path = Path::new(segment);
        let mut components = segment_path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return Err(invalid("key segment is not a plain file name")),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(invalid("key has no usable segments"));
    }
    Ok(path)
}

/// Get a unique path for a file, handling collisions according to the specified action
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `action` - How to handle file collisions
///
/// # Returns
///
/// Returns the final path to use. For Rename action, this may have a suffix added.
/// For Skip action, returns an error if the file already exists.
/// For Overwrite action, returns the original path unchanged.
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Sink(crate::error::SinkError::Exists(
                    path.to_path_buf(),
                )));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "Cannot extract file stem".to_string(),
                }
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "Cannot extract parent directory".to_string(),
            })?;

            // Try adding (1), (2), (3), ... until we find a unique name
            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Sink(crate::error::SinkError::Exists(
                path.to_path_buf(),
            )))
        }
    }
}

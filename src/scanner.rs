use std::path::Path;

use crate::error::{AnnotateError, Result};
use crate::types::{ImageFile, MediaType, Orientation};

/// Extensions picked up by [`scan_directory`], matched case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// List the supported images in `dir`, sorted by file name.
///
/// Subdirectories are not descended into. An empty result is not an error.
///
/// # Errors
///
/// Returns [`AnnotateError::DirectoryNotFound`] if `dir` does not exist or
/// is not a directory.
pub fn scan_directory(dir: &Path) -> Result<Vec<ImageFile>> {
    if !dir.is_dir() {
        return Err(AnnotateError::DirectoryNotFound(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| AnnotateError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AnnotateError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let media_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaType::from_extension)
        {
            Some(m) => m,
            None => continue,
        };

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => {
                tracing::warn!("Skipping non UTF-8 file name: {}", path.display());
                continue;
            }
        };

        files.push(ImageFile {
            filename,
            path,
            media_type,
        });
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}

/// Read an image's pixel dimensions from its header and classify it.
///
/// # Errors
///
/// Returns [`AnnotateError::UnreadableImage`] if the file cannot be decoded.
pub fn read_orientation(path: &Path) -> Result<Orientation> {
    let (width, height) =
        image::image_dimensions(path).map_err(|e| AnnotateError::UnreadableImage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(Orientation::from_dimensions(width, height))
}

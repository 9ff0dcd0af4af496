//! Reference template images loaded once at startup.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use picrelay_core::ReferenceImage;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

/// Images attached to every generation request, in file name order.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    images: Vec<ReferenceImage>,
}

/// Media type for the image extensions the provider accepts.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every supported image in `dir`. Other files are skipped.
    pub async fn load(dir: &Path) -> Result<Self, TemplateError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| TemplateError::Io(dir.to_path_buf(), e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TemplateError::Io(dir.to_path_buf(), e))?
        {
            let path = entry.path();
            if mime_type_for(&path).is_some() {
                paths.push(path);
            } else {
                warn!("Skipping non-image template file {}", path.display());
            }
        }
        paths.sort();

        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(mime_type) = mime_type_for(&path) else {
                continue;
            };
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| TemplateError::Io(path.clone(), e))?;
            images.push(ReferenceImage::new(mime_type, data));
        }

        info!("Loaded {} template image(s) from {}", images.len(), dir.display());
        Ok(Self { images })
    }

    pub fn images(&self) -> &[ReferenceImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

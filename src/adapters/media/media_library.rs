//! Filesystem media templates. Implements MediaPort.
//!
//! A template is `{tag}.{ext}` in the media directory. Resolution tries the
//! kinds in fixed order (video, image, document) and each kind's extensions
//! in order, so the first hit is deterministic.

use crate::domain::{DomainError, MediaKind, MediaTemplate, ResolvedMedia};
use crate::ports::MediaPort;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct MediaLibrary {
    dir: PathBuf,
}

impl MediaLibrary {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Tags come from model output; only plain file stems are accepted.
    fn is_safe_tag(tag: &str) -> bool {
        !tag.is_empty() && !tag.contains(['/', '\\']) && !tag.starts_with('.')
    }
}

#[async_trait::async_trait]
impl MediaPort for MediaLibrary {
    async fn resolve(&self, tag: &str) -> Result<Option<ResolvedMedia>, DomainError> {
        let tag = tag.trim();
        if !Self::is_safe_tag(tag) {
            warn!(tag, "rejected media tag");
            return Ok(None);
        }
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            warn!(dir = %self.dir.display(), "media directory not found");
            return Ok(None);
        }
        for kind in MediaKind::ALL {
            for ext in kind.extensions() {
                let path = self.dir.join(format!("{}.{}", tag, ext));
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    debug!(tag, path = %path.display(), kind = %kind, "media resolved");
                    return Ok(Some(ResolvedMedia { path, kind }));
                }
            }
        }
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<MediaTemplate>, DomainError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DomainError::Media(format!("read media dir: {}", e))),
        };
        let mut templates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DomainError::Media(e.to_string()))?
        {
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let path = entry.path();
            let filename = entry.file_name().to_string_lossy().into_owned();
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if filename.starts_with('.') || ext == "md" {
                continue;
            }
            let tag = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            templates.push(MediaTemplate {
                tag,
                filename,
                media_kind: MediaKind::from_extension(&ext),
                size_bytes: meta.len(),
            });
        }
        templates.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(templates)
    }
}

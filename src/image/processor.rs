use super::{compressor, ImageService};
use crate::models::{CompressionRequest, CompressionResult};
use crate::{Error, Result};
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compresses files on disk, replacing each one atomically.
pub struct ImageProcessor {
    dry_run: bool,
}

impl ImageProcessor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    fn compress_file_sync(
        path: &Path,
        request: &CompressionRequest,
        dry_run: bool,
    ) -> Result<CompressionResult> {
        let original = fs::read(path)?;
        let compressed = compressor::compress(&original, request)?;

        match compressed.output {
            Some(bytes) if !dry_run => {
                replace_atomically(path, &bytes)?;
                debug!("Replaced {}", path.display());
            }
            Some(_) => debug!("Dry run, leaving {} untouched", path.display()),
            None => {}
        }

        Ok(compressed.result)
    }
}

/// Write `bytes` to a temporary sibling of `path`, then rename it over `path`.
///
/// The temp file takes the original's permissions; the rename is the only step
/// that touches the original.
pub fn replace_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Invariant(format!("No file name in {}", path.display())))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name.to_string_lossy()))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    let permissions = fs::metadata(path)?.permissions();
    fs::set_permissions(tmp.path(), permissions)?;

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl ImageService for ImageProcessor {
    async fn compress_file(
        &self,
        path: &Path,
        request: &CompressionRequest,
    ) -> Result<CompressionResult> {
        let path: PathBuf = path.to_path_buf();
        let request = *request;
        let dry_run = self.dry_run;

        tokio::task::spawn_blocking(move || Self::compress_file_sync(&path, &request, dry_run))
            .await
            .map_err(|e| Error::Invariant(format!("Image compression task join error: {}", e)))?
    }
}

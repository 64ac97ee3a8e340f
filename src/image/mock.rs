use super::ImageService;
use crate::models::{CompressionRequest, CompressionResult};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory stand-in that reports every file as halved in size.
pub struct MockImageProcessor {
    processed: Arc<Mutex<Vec<PathBuf>>>,
    failing_names: Arc<Mutex<Vec<String>>>,
    original_bytes: u64,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            processed: Arc::new(Mutex::new(Vec::new())),
            failing_names: Arc::new(Mutex::new(Vec::new())),
            original_bytes: 1000,
        }
    }

    /// Fail any file whose name equals `name`.
    pub fn with_failure_for(self, name: &str) -> Self {
        self.failing_names.lock().unwrap().push(name.to_string());
        self
    }

    pub fn get_process_count(&self) -> usize {
        self.processed.lock().unwrap().len()
    }

    pub fn processed_paths(&self) -> Vec<PathBuf> {
        self.processed.lock().unwrap().clone()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockImageProcessor {
    async fn compress_file(
        &self,
        path: &Path,
        _request: &CompressionRequest,
    ) -> Result<CompressionResult> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.failing_names.lock().unwrap().contains(&name) {
            return Err(crate::Error::Decode(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }

        self.processed.lock().unwrap().push(path.to_path_buf());

        Ok(CompressionResult {
            changed: true,
            original_bytes: self.original_bytes,
            final_bytes: self.original_bytes / 2,
            quality: Some(75),
            width: 100,
            height: 100,
        })
    }
}

//! Image recompression
//!
//! Resizes and re-encodes site photos in place so each one stays under a
//! target byte budget for web delivery.

pub mod compressor;
pub mod mock;
pub mod processor;

pub use compressor::{compress, Compressed};
pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::models::{CompressionRequest, CompressionResult};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn compress_file(
        &self,
        path: &Path,
        request: &CompressionRequest,
    ) -> Result<CompressionResult>;
}

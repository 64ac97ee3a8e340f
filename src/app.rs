//! Batch orchestration: discover round folders, compress every photo, report.

use crate::image::{ImageProcessor, ImageService};
use crate::models::{BatchSummary, Config, CompressionResult};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use walkdir::WalkDir;

const PROGRESS_EVERY: usize = 25;

type Outcome = (usize, PathBuf, Result<CompressionResult>);

/// Runs the compressor over every configured round folder.
pub struct App {
    image: Arc<dyn ImageService>,
    config: Config,
}

impl App {
    /// Build an app around a specific image service.
    ///
    /// Integration tests use this to inject [`crate::image::MockImageProcessor`].
    pub fn with_services(image: Arc<dyn ImageService>, config: Config) -> Self {
        Self { image, config }
    }

    /// Construct an app that rewrites files on disk.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if config.dry_run {
            info!("DRY_RUN enabled, files will not be modified");
        }
        let image = Arc::new(ImageProcessor::new(config.dry_run));
        Ok(Self::with_services(image, config))
    }

    pub async fn run(&self) -> Result<BatchSummary> {
        self.config.validate()?;
        let mut summary = BatchSummary::new(self.config.dry_run);

        for round in &self.config.rounds {
            let folder = self.config.base_dir.join(round);
            if !folder.is_dir() {
                warn!("[skip] Missing folder: {}", folder.display());
                summary.missing_rounds.push(round.clone());
                continue;
            }

            let files = find_images(&folder);
            info!("{}: {} images", round, files.len());
            self.process_round(files, &mut summary).await?;
        }

        log_summary(&summary);

        if let Some(report_path) = &self.config.report_path {
            let json = serde_json::to_string_pretty(&summary)?;
            fs::write(report_path, json)?;
            info!("Wrote report to {}", report_path.display());
        }

        Ok(summary)
    }

    async fn process_round(&self, files: Vec<PathBuf>, summary: &mut BatchSummary) -> Result<()> {
        let total = files.len();
        let semaphore = Arc::new(Semaphore::new(self.config.jobs));
        let mut tasks = JoinSet::new();

        for (index, path) in files.into_iter().enumerate() {
            let image = Arc::clone(&self.image);
            let semaphore = Arc::clone(&semaphore);
            let request = self.config.request;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let err = Error::Invariant(format!("Worker semaphore closed: {}", e));
                        return (index, path, Err(err));
                    }
                };
                let result = image.compress_file(&path, &request).await;
                (index, path, result)
            });
        }

        let mut outcomes: Vec<Outcome> = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let outcome =
                joined.map_err(|e| Error::Invariant(format!("Compression task failed: {}", e)))?;
            if let (_, path, Err(e)) = &outcome {
                error!("[error] {}: {}", path.display(), e);
            }
            outcomes.push(outcome);

            if outcomes.len() % PROGRESS_EVERY == 0 {
                info!("  {}/{}...", outcomes.len(), total);
            }
        }

        // Record in discovery order regardless of completion order.
        outcomes.sort_by_key(|(index, _, _)| *index);
        for (_, path, result) in outcomes {
            match result {
                Ok(result) => summary.record(path, result),
                Err(e) => summary.record_failure(path, e.to_string()),
            }
        }

        Ok(())
    }
}

/// All `.jpg`/`.jpeg` files under `folder`, recursively, sorted by file name.
pub fn find_images(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Could not read directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_jpeg(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort_by_cached_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        (name, path.clone())
    });
    files
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

const MIB: f64 = 1024.0 * 1024.0;

pub fn log_summary(summary: &BatchSummary) {
    if !summary.failures.is_empty() {
        warn!("{} images failed", summary.failures.len());
    }

    if summary.processed == 0 {
        info!("No images processed.");
        return;
    }

    info!("Processed: {}", summary.processed);
    info!("Changed:   {}", summary.changed);
    info!(
        "Total:     {:.2}MB -> {:.2}MB",
        summary.total_original_bytes as f64 / MIB,
        summary.total_final_bytes as f64 / MIB
    );
    if let Some(savings) = summary.savings_ratio() {
        info!("Savings:   {:.1}%", savings * 100.0);
    }
}

//! Data models and structures
//!
//! Defines the compression request/result types, the batch summary written
//! at the end of a run, and the environment-driven configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_DIM: u32 = 2048;
pub const DEFAULT_TARGET_KB: u64 = 350;
pub const DEFAULT_SKIP_UNDER_KB: u64 = 450;
pub const DEFAULT_MIN_QUALITY: u8 = 50;
pub const DEFAULT_MAX_QUALITY: u8 = 85;
pub const DEFAULT_BASE_DIR: &str = "assets/img/2025photos";
pub const DEFAULT_ROUNDS: [&str; 3] = ["Round 1", "Round 4", "Round 5"];

/// Per-batch compression settings. Sizes are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionRequest {
    /// Maximum long edge in pixels.
    pub max_dim: u32,
    pub target_bytes: u64,
    /// Images already under this size are left alone unless they need a resize.
    pub skip_under_bytes: u64,
    pub min_quality: u8,
    pub max_quality: u8,
}

impl Default for CompressionRequest {
    fn default() -> Self {
        Self {
            max_dim: DEFAULT_MAX_DIM,
            target_bytes: DEFAULT_TARGET_KB * 1024,
            skip_under_bytes: DEFAULT_SKIP_UNDER_KB * 1024,
            min_quality: DEFAULT_MIN_QUALITY,
            max_quality: DEFAULT_MAX_QUALITY,
        }
    }
}

impl CompressionRequest {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_dim == 0 {
            return Err(crate::Error::Config("max_dim must be at least 1".to_string()));
        }
        if self.target_bytes == 0 {
            return Err(crate::Error::Config(
                "target size must be greater than zero".to_string(),
            ));
        }
        if self.min_quality < 1 || self.max_quality > 100 {
            return Err(crate::Error::Config(format!(
                "quality bounds must lie within 1-100 (got {}-{})",
                self.min_quality, self.max_quality
            )));
        }
        if self.min_quality > self.max_quality {
            return Err(crate::Error::Config(format!(
                "min_quality {} exceeds max_quality {}",
                self.min_quality, self.max_quality
            )));
        }
        Ok(())
    }
}

/// Outcome of compressing one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub changed: bool,
    pub original_bytes: u64,
    pub final_bytes: u64,
    /// `None` when the image was left unchanged.
    pub quality: Option<u8>,
    pub width: u32,
    pub height: u32,
}

impl CompressionResult {
    pub fn unchanged(original_bytes: u64, width: u32, height: u32) -> Self {
        Self {
            changed: false,
            original_bytes,
            final_bytes: original_bytes,
            quality: None,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub path: PathBuf,
    #[serde(flatten)]
    pub result: CompressionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedImage {
    pub path: PathBuf,
    pub error: String,
}

/// Totals and per-file outcomes for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub processed: usize,
    pub changed: usize,
    pub total_original_bytes: u64,
    pub total_final_bytes: u64,
    pub missing_rounds: Vec<String>,
    pub images: Vec<ProcessedImage>,
    pub failures: Vec<FailedImage>,
}

impl BatchSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            dry_run,
            processed: 0,
            changed: 0,
            total_original_bytes: 0,
            total_final_bytes: 0,
            missing_rounds: Vec::new(),
            images: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, path: PathBuf, result: CompressionResult) {
        self.processed += 1;
        self.total_original_bytes += result.original_bytes;
        self.total_final_bytes += result.final_bytes;
        if result.changed {
            self.changed += 1;
        }
        self.images.push(ProcessedImage { path, result });
    }

    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failures.push(FailedImage { path, error });
    }

    /// Fraction of bytes saved, or `None` when nothing was measured.
    pub fn savings_ratio(&self) -> Option<f64> {
        if self.total_original_bytes == 0 {
            return None;
        }
        Some(1.0 - self.total_final_bytes as f64 / self.total_original_bytes as f64)
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub rounds: Vec<String>,
    pub request: CompressionRequest,
    pub jobs: usize,
    pub dry_run: bool,
    pub report_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            rounds: DEFAULT_ROUNDS.iter().map(|r| r.to_string()).collect(),
            request: CompressionRequest::default(),
            jobs: 1,
            dry_run: false,
            report_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unset keys fall back
    /// to defaults; set-but-unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let rounds = match lookup("PHOTOS_ROUNDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.rounds,
        };

        let request = CompressionRequest {
            max_dim: parse_var(&lookup, "PHOTOS_MAX_DIM")?.unwrap_or(DEFAULT_MAX_DIM),
            target_bytes: parse_var::<u64, _>(&lookup, "PHOTOS_TARGET_KB")?
                .unwrap_or(DEFAULT_TARGET_KB)
                .saturating_mul(1024),
            skip_under_bytes: parse_var::<u64, _>(&lookup, "PHOTOS_SKIP_UNDER_KB")?
                .unwrap_or(DEFAULT_SKIP_UNDER_KB)
                .saturating_mul(1024),
            min_quality: parse_var(&lookup, "PHOTOS_MIN_QUALITY")?.unwrap_or(DEFAULT_MIN_QUALITY),
            max_quality: parse_var(&lookup, "PHOTOS_MAX_QUALITY")?.unwrap_or(DEFAULT_MAX_QUALITY),
        };

        Ok(Self {
            base_dir: lookup("PHOTOS_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.base_dir),
            rounds,
            request,
            jobs: parse_var(&lookup, "PHOTOS_JOBS")?.unwrap_or(defaults.jobs),
            dry_run: lookup("DRY_RUN")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            report_path: lookup("PHOTOS_REPORT").map(PathBuf::from),
        })
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.jobs == 0 {
            return Err(crate::Error::Config("jobs must be at least 1".to_string()));
        }
        self.request.validate()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> crate::Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| crate::Error::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_request_is_valid() {
        let request = CompressionRequest::default();
        assert!(request.validate().is_ok());
        assert_eq!(request.target_bytes, 350 * 1024);
        assert_eq!(request.skip_under_bytes, 450 * 1024);
    }

    #[test]
    fn test_request_validation_rejects_bad_bounds() {
        let inverted = CompressionRequest {
            min_quality: 90,
            max_quality: 80,
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(crate::Error::Config(_))));

        let zero_quality = CompressionRequest {
            min_quality: 0,
            ..Default::default()
        };
        assert!(zero_quality.validate().is_err());

        let over_hundred = CompressionRequest {
            max_quality: 101,
            ..Default::default()
        };
        assert!(over_hundred.validate().is_err());

        let zero_target = CompressionRequest {
            target_bytes: 0,
            ..Default::default()
        };
        assert!(zero_target.validate().is_err());

        let zero_dim = CompressionRequest {
            max_dim: 0,
            ..Default::default()
        };
        assert!(zero_dim.validate().is_err());
    }

    #[test]
    fn test_config_defaults_when_env_empty() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.base_dir, PathBuf::from(DEFAULT_BASE_DIR));
        assert_eq!(config.rounds, vec!["Round 1", "Round 4", "Round 5"]);
        assert_eq!(config.request, CompressionRequest::default());
        assert_eq!(config.jobs, 1);
        assert!(!config.dry_run);
        assert!(config.report_path.is_none());
    }

    #[test]
    fn test_config_reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PHOTOS_BASE_DIR", "/srv/photos"),
            ("PHOTOS_ROUNDS", "Round 2, Round 3,,"),
            ("PHOTOS_MAX_DIM", "1600"),
            ("PHOTOS_TARGET_KB", "200"),
            ("PHOTOS_SKIP_UNDER_KB", "250"),
            ("PHOTOS_MIN_QUALITY", "40"),
            ("PHOTOS_MAX_QUALITY", "90"),
            ("PHOTOS_JOBS", "4"),
            ("DRY_RUN", "true"),
        ]))
        .unwrap();

        assert_eq!(config.base_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.rounds, vec!["Round 2", "Round 3"]);
        assert_eq!(config.request.max_dim, 1600);
        assert_eq!(config.request.target_bytes, 200 * 1024);
        assert_eq!(config.request.skip_under_bytes, 250 * 1024);
        assert_eq!(config.request.min_quality, 40);
        assert_eq!(config.request.max_quality, 90);
        assert_eq!(config.jobs, 4);
        assert!(config.dry_run);
    }

    #[test]
    fn test_config_rejects_unparseable_values() {
        let err = Config::from_lookup(lookup_from(&[("PHOTOS_MAX_DIM", "big")])).unwrap_err();
        assert!(err.to_string().contains("PHOTOS_MAX_DIM"));
    }

    #[test]
    fn test_config_validate_rejects_zero_jobs() {
        let config = Config {
            jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = BatchSummary::new(false);
        summary.record(
            PathBuf::from("a.jpg"),
            CompressionResult {
                changed: true,
                original_bytes: 1000,
                final_bytes: 400,
                quality: Some(80),
                width: 10,
                height: 10,
            },
        );
        summary.record(PathBuf::from("b.jpg"), CompressionResult::unchanged(1000, 10, 10));
        summary.record_failure(PathBuf::from("c.jpg"), "boom".to_string());

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.total_original_bytes, 2000);
        assert_eq!(summary.total_final_bytes, 1400);
        assert_eq!(summary.failures.len(), 1);
        let savings = summary.savings_ratio().unwrap();
        assert!((savings - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_summary_serialization_uses_null_quality_for_unchanged() {
        let mut summary = BatchSummary::new(true);
        summary.record(PathBuf::from("a.jpg"), CompressionResult::unchanged(5, 1, 1));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["images"][0]["path"], "a.jpg");
        assert_eq!(json["images"][0]["changed"], false);
        assert!(json["images"][0]["quality"].is_null());
        assert_eq!(json["dry_run"], true);
        assert!(BatchSummary::new(false).savings_ratio().is_none());
    }
}

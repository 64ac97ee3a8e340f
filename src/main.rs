use anyhow::Result;
use clap::Parser;
use photo_squeeze::app::App;
use photo_squeeze::models::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "photo-squeeze")]
#[command(about = "Downsize and recompress photo folders toward a target size")]
struct CliArgs {
    /// Base folder containing the round folders
    #[arg(long, value_name = "DIR")]
    base: Option<PathBuf>,

    /// Round folder names to process
    #[arg(long, num_args = 1.., value_name = "NAME")]
    rounds: Option<Vec<String>>,

    /// Max long edge in pixels
    #[arg(long)]
    max_dim: Option<u32>,

    /// Target output size per image in KB (best effort)
    #[arg(long)]
    target_kb: Option<u64>,

    /// Skip images already under this size (KB) if no resize is needed
    #[arg(long)]
    skip_under_kb: Option<u64>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    min_quality: Option<u8>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    max_quality: Option<u8>,

    /// Number of images to compress concurrently
    #[arg(long)]
    jobs: Option<usize>,

    /// Report what would change without writing any files
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON summary to this path
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl CliArgs {
    fn apply(self, config: &mut Config) {
        if let Some(base) = self.base {
            config.base_dir = base;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(max_dim) = self.max_dim {
            config.request.max_dim = max_dim;
        }
        if let Some(kb) = self.target_kb {
            config.request.target_bytes = kb.saturating_mul(1024);
        }
        if let Some(kb) = self.skip_under_kb {
            config.request.skip_under_bytes = kb.saturating_mul(1024);
        }
        if let Some(q) = self.min_quality {
            config.request.min_quality = q;
        }
        if let Some(q) = self.max_quality {
            config.request.max_quality = q;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(report) = self.report {
            config.report_path = Some(report);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_squeeze=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    info!("Compressing photos under {}", config.base_dir.display());

    match App::new(config) {
        Ok(app) => match app.run().await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Compression run failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = CliArgs::parse_from([
            "photo-squeeze",
            "--base",
            "/tmp/photos",
            "--rounds",
            "Round 2",
            "Round 3",
            "--target-kb",
            "300",
            "--min-quality",
            "60",
            "--dry-run",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.base_dir, PathBuf::from("/tmp/photos"));
        assert_eq!(config.rounds, vec!["Round 2", "Round 3"]);
        assert_eq!(config.request.target_bytes, 300 * 1024);
        assert_eq!(config.request.min_quality, 60);
        assert_eq!(config.request.max_quality, 85);
        assert!(config.dry_run);
    }

    #[test]
    fn test_cli_rejects_out_of_range_quality() {
        let err = CliArgs::try_parse_from(["photo-squeeze", "--max-quality", "101"]);
        assert!(err.is_err());
    }
}

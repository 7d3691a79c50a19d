use chrono::NaiveDate;
use clap::Parser;

use crate::config::JobConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "soil-fetcher")]
#[command(about = "Daily soil-moisture ingestion for a zone of interest")]
pub struct Cli {
    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    pub env_file: Option<String>,

    /// Path to a TOML job file with zone, dataset and classification settings
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override WINDOW_DAYS
    #[arg(long)]
    pub window_days: Option<u32>,

    /// Last date of the window (YYYY-MM-DD); defaults to yesterday (UTC)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Show which dates would be fetched without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Command-line values win over environment and job file.
    pub fn apply_overrides(&self, config: &mut JobConfig) {
        if let Some(days) = self.window_days {
            config.window_days = days;
        }
        if let Some(end) = self.end_date {
            config.end_date = Some(end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "soil-fetcher",
            "--window-days",
            "3",
            "--end-date",
            "2024-06-10",
            "--dry-run",
            "-v",
        ]);
        assert_eq!(cli.window_days, Some(3));
        assert_eq!(cli.end_date, NaiveDate::from_ymd_opt(2024, 6, 10));
        assert!(cli.dry_run);
        assert!(cli.verbose);
        assert!(!cli.log_json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(Cli::try_parse_from(["soil-fetcher", "--end-date", "10/06/2024"]).is_err());
    }
}

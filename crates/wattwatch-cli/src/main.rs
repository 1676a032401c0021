//! CLI for wattwatch: the battery doesn't lie.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::Overrides;

#[derive(Parser)]
#[command(name = "wattwatch")]
#[command(about = "wattwatch: flags battery drain the visible workload can't explain")]
#[command(version = wattwatch_core::VERSION)]
struct Cli {
    /// JSON config file; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sentinel: compare actual vs. predicted drain every interval
    Watch {
        /// Model artifact (JSON)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Seconds between checks
        #[arg(long)]
        interval: Option<f64>,

        /// Alert when actual exceeds predicted by more than this many mA
        #[arg(long)]
        threshold: Option<f64>,

        /// Consecutive suspicious checks before alerting
        #[arg(long)]
        limit: Option<u32>,

        /// Also vibrate and post a notification through Termux:API
        #[arg(long)]
        termux: bool,

        /// Stop after this many checks (default: until Ctrl+C)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        cycles: Option<u64>,

        /// Only print alerts, not the per-check status line
        #[arg(long)]
        quiet: bool,
    },

    /// Read every sensor once and report which ones are present
    Probe,

    /// Log sensor telemetry to CSV for model training
    Record {
        /// CSV file to append to
        #[arg(long, default_value = "watt_watch_data.csv")]
        output: PathBuf,

        /// Seconds between rows
        #[arg(long)]
        interval: Option<f64>,

        /// Stop after this many rows (default: until Ctrl+C)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        rows: Option<u64>,
    },

    /// Score one feature vector offline; optionally judge an actual reading
    Score {
        /// Model artifact (JSON)
        #[arg(long)]
        model: Option<PathBuf>,

        #[arg(long, default_value = "0")]
        brightness: f64,

        /// Average CPU frequency (kHz, as in scaling_cur_freq)
        #[arg(long, default_value = "0")]
        cpu_freq: f64,

        /// GPU load percent
        #[arg(long, default_value = "0")]
        gpu_load: f64,

        #[arg(long, default_value = "0")]
        wifi_kbps: f64,

        #[arg(long, default_value = "0")]
        cell_kbps: f64,

        /// Measured current in mA to compare against the prediction
        #[arg(long)]
        actual: Option<i64>,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let code = match cli.command {
        Commands::Watch {
            model,
            interval,
            threshold,
            limit,
            termux,
            cycles,
            quiet,
        } => commands::watch::run(
            config_path,
            Overrides {
                model,
                interval,
                threshold,
                limit,
            },
            commands::watch::WatchOptions {
                termux,
                cycles,
                quiet,
            },
        ),
        Commands::Probe => commands::probe::run(config_path),
        Commands::Record {
            output,
            interval,
            rows,
        } => commands::record::run(
            config_path,
            Overrides {
                interval,
                ..Overrides::default()
            },
            &output,
            rows,
        ),
        Commands::Score {
            model,
            brightness,
            cpu_freq,
            gpu_load,
            wifi_kbps,
            cell_kbps,
            actual,
            threshold,
        } => commands::score::run(
            config_path,
            Overrides {
                model,
                threshold,
                ..Overrides::default()
            },
            wattwatch_core::FeatureVector {
                brightness,
                avg_cpu_freq: cpu_freq,
                gpu_load_pct: gpu_load,
                wifi_kbps,
                cell_kbps,
            },
            actual,
        ),
        Commands::Config => commands::config::run(config_path),
    };

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cycle_and_row_limits_are_rejected() {
        assert!(Cli::try_parse_from(["wattwatch", "watch", "--cycles", "0"]).is_err());
        assert!(Cli::try_parse_from(["wattwatch", "record", "--rows", "0"]).is_err());
    }

    #[test]
    fn positive_limits_parse() {
        let cli = Cli::try_parse_from(["wattwatch", "record", "--rows", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Record { rows: Some(3), .. }));
        let cli = Cli::try_parse_from(["wattwatch", "watch", "--cycles", "1"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch { cycles: Some(1), .. }));
    }
}

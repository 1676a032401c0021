//! Alert delivery.
//!
//! Sinks return nothing to the caller. Delivery problems are logged and
//! dropped here so they never touch detection state.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::detector::Observation;

/// Receives every alert-level observation.
pub trait AlertSink {
    fn notify(&mut self, observation: &Observation);
}

/// Human-readable alert line.
pub fn alert_message(observation: &Observation) -> String {
    format!(
        "ANOMALY! Drain: {}mA | Expected: {:.0}mA | Diff: +{:.0}mA",
        observation.actual_ma, observation.predicted_ma, observation.diff
    )
}

/// Red alert line on stdout. The log record is debug-level so the default
/// `info` filter does not print the alert a second time on stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl AlertSink for ConsoleSink {
    fn notify(&mut self, observation: &Observation) {
        let msg = alert_message(observation);
        log::debug!("{msg}");
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "\x1b[91m{msg}\x1b[0m") {
            log::debug!("console alert not written: {e}");
        }
    }
}

/// Vibration and a system notification through the Termux:API tools.
#[derive(Debug, Clone)]
pub struct TermuxSink {
    pub title: String,
    pub vibrate_ms: u32,
}

impl Default for TermuxSink {
    fn default() -> Self {
        Self {
            title: "WattWatch Security".to_string(),
            vibrate_ms: 500,
        }
    }
}

impl TermuxSink {
    fn run(program: &str, args: &[&str]) {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => {}
            Ok(s) => log::debug!("{program} exited with {s}"),
            Err(e) => log::debug!("{program} unavailable: {e}"),
        }
    }
}

impl AlertSink for TermuxSink {
    fn notify(&mut self, observation: &Observation) {
        let msg = alert_message(observation);
        let duration = self.vibrate_ms.to_string();
        Self::run("termux-vibrate", &["-d", &duration, "-f"]);
        Self::run(
            "termux-notification",
            &["--title", &self.title, "--content", &msg],
        );
    }
}

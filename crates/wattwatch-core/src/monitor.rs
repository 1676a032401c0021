//! The polling loop: sample → deltas → predict → detect → alert.
//!
//! One cycle at a time on the caller's thread. All mutable state (the
//! previous sample and the suspicion counter) is owned here, and the only
//! blocking point is the sleep between cycles, which watches a [`StopSignal`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::alert::AlertSink;
use crate::delta::{Deltas, SampleWindow};
use crate::detector::{AnomalyDetector, DetectorConfig, Observation, Verdict};
use crate::predictor::Predictor;
use crate::sensor::{RawSample, SensorSource};

const STOP_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cloneable stop flag, checked at every cycle boundary.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`, waking early on stop. Returns `false` if stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while !self.is_triggered() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(STOP_POLL.min(deadline - now));
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// A sensor source paired with the window of its last sample.
pub struct Sampler<S> {
    sensors: S,
    window: SampleWindow,
}

impl<S: SensorSource> Sampler<S> {
    /// Takes the baseline sample immediately.
    pub fn new(mut sensors: S) -> Self {
        let window = SampleWindow::new(sensors.sample());
        Self { sensors, window }
    }

    /// Read a fresh sample and difference it against the previous one.
    pub fn next_deltas(&mut self) -> (Deltas, f64) {
        let current = self.sensors.sample();
        let timestamp = current.timestamp;
        (self.window.advance(current), timestamp)
    }

    pub fn last_sample(&self) -> &RawSample {
        self.window.previous()
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Everything one cycle produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub deltas: Deltas,
    pub observation: Observation,
    pub verdict: Verdict,
    pub suspicion_limit: u32,
}

pub struct Monitor<S, P> {
    sampler: Sampler<S>,
    predictor: P,
    detector: AnomalyDetector,
    sinks: Vec<Box<dyn AlertSink>>,
    interval: Duration,
    cycles: u64,
    alerts: u64,
}

impl<S: SensorSource, P: Predictor> Monitor<S, P> {
    /// Build a monitor; the baseline sample is read here.
    pub fn new(sensors: S, predictor: P, detector: DetectorConfig, interval: Duration) -> Self {
        Self {
            sampler: Sampler::new(sensors),
            predictor,
            detector: AnomalyDetector::new(detector),
            sinks: Vec::new(),
            interval,
            cycles: 0,
            alerts: 0,
        }
    }

    pub fn with_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn alerts(&self) -> u64 {
        self.alerts
    }

    /// Run exactly one cycle, without sleeping.
    pub fn cycle(&mut self) -> CycleReport {
        let (deltas, timestamp) = self.sampler.next_deltas();
        let predicted_ma = self.predictor.predict(&deltas.features);
        let observation = Observation::new(deltas.current_ma, predicted_ma, timestamp);
        let verdict = self.detector.observe(&observation);

        self.cycles += 1;
        if verdict.is_alert() {
            self.alerts += 1;
            for sink in &mut self.sinks {
                sink.notify(&observation);
            }
        }

        CycleReport {
            deltas,
            observation,
            verdict,
            suspicion_limit: self.detector.config().suspicion_limit,
        }
    }

    /// Sleep, cycle, repeat until `stop` fires. Returns the cycles run.
    pub fn run(&mut self, stop: &StopSignal, mut on_cycle: impl FnMut(&CycleReport)) -> u64 {
        log::info!(
            "sentinel active: threshold +{}mA, limit {}, interval {:?}",
            self.detector.config().anomaly_threshold_ma,
            self.detector.config().suspicion_limit,
            self.interval
        );
        let start = self.cycles;
        while stop.sleep(self.interval) {
            let report = self.cycle();
            on_cycle(&report);
        }
        log::info!(
            "sentinel stopped after {} cycles ({} alerts)",
            self.cycles - start,
            self.alerts
        );
        self.cycles - start
    }
}

//! Sensor input contracts for the whip detector.
//!
//! The detector pulls the latest reading from an accelerometer and an
//! orientation source. Hardware backends live outside this crate; the
//! stream-fed sources here hold whatever the host pushed last.

use serde::{Deserialize, Serialize};

// ── Public types ────────────────────────────────────────────────────────────

/// One 3-axis acceleration reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(rename = "t", default)]
    pub timestamp_ms: u64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms: 0,
        }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

/// Coarse device orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Undefined,
    TopUp,
    TopDown,
    LeftUp,
    RightUp,
    FaceUp,
    FaceDown,
}

/// A supported accelerometer output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputRange {
    pub minimum: f64,
    pub maximum: f64,
    pub accuracy: f64,
}

impl OutputRange {
    /// Symmetric range `[-maximum, maximum]`.
    pub fn symmetric(maximum: f64) -> Self {
        Self {
            minimum: -maximum,
            maximum,
            accuracy: 0.0,
        }
    }
}

// ── Input contracts ─────────────────────────────────────────────────────────

pub trait Accelerometer {
    /// Supported output ranges, most preferred first.
    fn output_ranges(&self) -> Vec<OutputRange>;
    /// Returns the running state after the start attempt.
    fn start(&mut self) -> bool;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
    /// Latest reading.
    fn reading(&self) -> Sample;
}

pub trait OrientationSensor {
    fn start(&mut self) -> bool;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
    fn reading(&self) -> Orientation;
}

// ── Stream-fed sources ──────────────────────────────────────────────────────

/// Accelerometer fed by the host, one sample at a time.
#[derive(Debug, Clone, Default)]
pub struct StreamAccelerometer {
    ranges: Vec<OutputRange>,
    latest: Sample,
    active: bool,
}

impl StreamAccelerometer {
    pub fn new(ranges: Vec<OutputRange>) -> Self {
        Self {
            ranges,
            latest: Sample::default(),
            active: false,
        }
    }

    /// Replace the latest reading. The caller is responsible for notifying
    /// the detector afterwards.
    pub fn push(&mut self, sample: Sample) {
        self.latest = sample;
    }
}

impl Accelerometer for StreamAccelerometer {
    fn output_ranges(&self) -> Vec<OutputRange> {
        self.ranges.clone()
    }

    fn start(&mut self) -> bool {
        self.active = true;
        self.active
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reading(&self) -> Sample {
        self.latest
    }
}

/// Orientation source fed by the host.
#[derive(Debug, Clone, Default)]
pub struct StreamOrientation {
    latest: Orientation,
    active: bool,
}

impl StreamOrientation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, orientation: Orientation) {
        self.latest = orientation;
    }
}

impl OrientationSensor for StreamOrientation {
    fn start(&mut self) -> bool {
        self.active = true;
        self.active
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reading(&self) -> Orientation {
        self.latest
    }
}

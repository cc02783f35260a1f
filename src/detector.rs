//! Whip gesture detector.
//!
//! A whip is a small x-axis movement followed, within 750 ms, by a much larger
//! one in the same direction while the device is held roughly upright.
//! Thresholds scale with the accelerometer's reported output range.

use std::f64::consts::{FRAC_PI_2, PI};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::sensor::{Accelerometer, Orientation, OrientationSensor, Sample};
use crate::timer::Timer;

/// Fraction of the range a delta must exceed to confirm a whip.
pub const THRESHOLD_FACTOR: f64 = 0.95;
/// Fraction of the range a delta must stay under to arm.
pub const DETECTION_FACTOR: f64 = 0.3;
pub const MAX_TILT_DEGREES: f64 = 25.0;
pub const TIMEOUT: Duration = Duration::from_millis(750);
/// Deltas below this are noise and leave the state untouched.
pub const MIN_DELTA: f64 = 1.0;
/// Used when the accelerometer reports no output range.
pub const FALLBACK_RANGE: f64 = 44.0;

/// Registry identifier.
pub const IDENTIFIER: &str = "QtSensors.whip";
/// Token carried by the generic detection event.
pub const GESTURE_NAME: &str = "whip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureEvent {
    Whip,
    Detected(String),
}

impl GestureEvent {
    pub fn id(&self) -> &str {
        match self {
            GestureEvent::Whip => GESTURE_NAME,
            GestureEvent::Detected(name) => name,
        }
    }
}

/// Outcome of one evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Delta under the noise floor; `last_x` kept.
    Noise,
    /// Idle -> Armed.
    Armed,
    /// Armed -> Idle with a whip.
    Confirmed,
    /// No transition.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorState {
    pub armed: bool,
    /// Only meaningful while armed.
    pub was_negative: bool,
    pub last_x: f64,
    /// Only meaningful while armed.
    pub detected_x: f64,
    pub accel_range: f64,
}

impl DetectorState {
    pub fn new(accel_range: f64) -> Self {
        Self {
            armed: false,
            was_negative: false,
            last_x: 0.0,
            detected_x: 0.0,
            accel_range,
        }
    }
}

/// Signed roll of the gravity vector folded into (-90, 90] degrees.
pub fn tilt_degrees(x: f64, y: f64, z: f64) -> f64 {
    let yaw = z.atan2((x * x + y * y).sqrt());
    let mut angle = yaw.sin().atan2(yaw.cos());
    if angle > FRAC_PI_2 {
        angle = PI - angle;
    } else if angle < -FRAC_PI_2 {
        angle = -(PI + angle);
    }
    angle.to_degrees()
}

/// Run one sample through the state machine.
///
/// Timer and event side effects are left to the caller, keyed off the
/// returned step.
pub fn evaluate(state: &mut DetectorState, sample: Sample, orientation: Orientation) -> Step {
    let x = sample.x;
    let difference = state.last_x - x;
    if difference.abs() < MIN_DELTA {
        return Step::Noise;
    }

    let degrees_z = tilt_degrees(x, sample.y, sample.z);
    let upright = degrees_z.abs() < MAX_TILT_DEGREES;

    let step = if state.armed {
        let limit = state.accel_range * THRESHOLD_FACTOR;
        let same_direction = if state.was_negative {
            difference < -limit
        } else {
            difference > limit
        };
        if same_direction && upright && state.detected_x.abs() < x.abs() {
            state.armed = false;
            Step::Confirmed
        } else {
            Step::Unchanged
        }
    } else {
        let limit = state.accel_range * DETECTION_FACTOR;
        let small_motion = (difference > 0.0 && difference < limit)
            || (difference < 0.0 && difference > -limit);
        if small_motion && upright && orientation != Orientation::FaceUp {
            state.detected_x = x;
            state.armed = true;
            state.was_negative = difference < 0.0;
            Step::Armed
        } else {
            Step::Unchanged
        }
    };

    state.last_x = x;
    step
}

type Observer = Box<dyn FnMut(&GestureEvent)>;

pub struct WhipDetector<A, O, T> {
    accel: A,
    orientation: O,
    timer: T,
    state: DetectorState,
    active: bool,
    subscribed: bool,
    observers: Vec<Observer>,
}

impl<A: Accelerometer, O: OrientationSensor, T: Timer> WhipDetector<A, O, T> {
    /// Reads the accelerometer range and prepares the timeout timer.
    pub fn new(accel: A, orientation: O, mut timer: T) -> Self {
        let accel_range = match accel.output_ranges().first() {
            Some(range) => range.maximum,
            None => {
                warn!(fallback = FALLBACK_RANGE, "accelerometer reports no output range");
                FALLBACK_RANGE
            }
        };
        timer.cancel();
        timer.set_interval(TIMEOUT);

        Self {
            accel,
            orientation,
            timer,
            state: DetectorState::new(accel_range),
            active: false,
            subscribed: false,
            observers: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&GestureEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Start both sources and listen for acceleration changes. Repeated
    /// calls keep a single subscription.
    pub fn start(&mut self) -> bool {
        self.subscribed = true;
        self.active = self.accel.start();
        self.orientation.start();
        info!(active = self.active, "whip detector started");
        self.active
    }

    /// Stop both sources and drop any gesture in progress. Returns true when
    /// the accelerometer is no longer running.
    pub fn stop(&mut self) -> bool {
        self.accel.stop();
        self.active = self.accel.is_active();
        self.orientation.stop();
        self.subscribed = false;
        self.state.armed = false;
        self.timer.cancel();
        info!(active = self.active, "whip detector stopped");
        !self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn accelerometer(&self) -> &A {
        &self.accel
    }

    pub fn accelerometer_mut(&mut self) -> &mut A {
        &mut self.accel
    }

    pub fn orientation_mut(&mut self) -> &mut O {
        &mut self.orientation
    }

    /// Change notification from the accelerometer. Ignored while stopped.
    pub fn on_acceleration_changed(&mut self) -> Step {
        if !self.subscribed {
            return Step::Unchanged;
        }

        let sample = self.accel.reading();
        let orientation = self.orientation.reading();
        let step = evaluate(&mut self.state, sample, orientation);

        match step {
            Step::Armed => {
                self.timer.start();
                debug!(
                    x = sample.x,
                    negative = self.state.was_negative,
                    "whip candidate armed"
                );
            }
            Step::Confirmed => {
                // The pending timeout is left to expire on an idle detector.
                info!(x = sample.x, t = sample.timestamp_ms, "whip detected");
                self.emit(GestureEvent::Whip);
                self.emit(GestureEvent::Detected(GESTURE_NAME.to_string()));
            }
            Step::Noise | Step::Unchanged => {}
        }
        step
    }

    /// Timer expiry: abandon the candidate gesture without an event.
    pub fn on_timeout(&mut self) {
        if self.state.armed {
            debug!("whip candidate expired");
        }
        self.state.armed = false;
    }

    /// Deliver a due timer expiry. Returns whether the timer fired.
    pub fn poll_timeout(&mut self) -> bool {
        if self.timer.take_expired() {
            self.on_timeout();
            true
        } else {
            false
        }
    }

    pub fn time_until_timeout(&self) -> Option<Duration> {
        self.timer.remaining()
    }

    fn emit(&mut self, event: GestureEvent) {
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }
}

//! Whip gesture detection from accelerometer and orientation readings.
//!
//! ```ignore
//! use whip::{DeadlineTimer, OutputRange, Sample, StreamAccelerometer, StreamOrientation, WhipDetector};
//!
//! let accel = StreamAccelerometer::new(vec![OutputRange::symmetric(40.0)]);
//! let mut detector = WhipDetector::new(accel, StreamOrientation::new(), DeadlineTimer::new());
//! detector.subscribe(|event| println!("{}", event.id()));
//! detector.start();
//!
//! detector.accelerometer_mut().push(Sample::new(8.0, 0.0, 0.0));
//! detector.on_acceleration_changed();
//! ```

pub mod broadcast;
pub mod detector;
pub mod error;
pub mod feed;
pub mod sensor;
pub mod timer;

pub use detector::{evaluate, tilt_degrees, DetectorState, GestureEvent, Step, WhipDetector};
pub use error::{Error, Result};
pub use feed::SensorEvent;
pub use sensor::{
    Accelerometer, Orientation, OrientationSensor, OutputRange, Sample, StreamAccelerometer,
    StreamOrientation,
};
pub use timer::{Clock, DeadlineTimer, FeedClock, ManualClock, SystemClock, Timer};

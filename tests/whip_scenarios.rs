use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use whip::{
    Accelerometer, DeadlineTimer, GestureEvent, ManualClock, Orientation, OutputRange, Sample,
    Step, StreamAccelerometer, StreamOrientation, WhipDetector,
};

type Detector = WhipDetector<StreamAccelerometer, StreamOrientation, DeadlineTimer<ManualClock>>;

struct Rig {
    det: Detector,
    clock: ManualClock,
    events: Rc<RefCell<Vec<GestureEvent>>>,
}

impl Rig {
    fn new(ranges: Vec<OutputRange>) -> Self {
        let clock = ManualClock::new();
        let mut det = WhipDetector::new(
            StreamAccelerometer::new(ranges),
            StreamOrientation::new(),
            DeadlineTimer::with_clock(clock.clone()),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        det.subscribe(move |e: &GestureEvent| sink.borrow_mut().push(e.clone()));
        assert!(det.start());
        Self { det, clock, events }
    }

    fn with_range(range: f64) -> Self {
        Self::new(vec![OutputRange::symmetric(range)])
    }

    fn feed(&mut self, x: f64) -> Step {
        self.det.accelerometer_mut().push(Sample::new(x, 0.0, 0.0));
        self.det.on_acceleration_changed()
    }

    fn elapse(&mut self, ms: u64) -> bool {
        self.clock.advance(Duration::from_millis(ms));
        self.det.poll_timeout()
    }

    fn events(&self) -> Vec<GestureEvent> {
        self.events.borrow().clone()
    }
}

#[test]
fn whip_fires_after_arm_and_confirm() {
    let mut rig = Rig::with_range(40.0);

    assert_eq!(rig.feed(0.0), Step::Noise);
    assert_eq!(rig.feed(8.0), Step::Armed);
    assert!(rig.det.is_armed());
    assert_eq!(rig.det.state().detected_x, 8.0);

    assert!(!rig.elapse(200));
    assert_eq!(rig.feed(48.0), Step::Confirmed);
    assert!(!rig.det.is_armed());
    assert_eq!(
        rig.events(),
        vec![GestureEvent::Whip, GestureEvent::Detected("whip".to_string())]
    );
}

#[test]
fn candidate_expires_silently() {
    let mut rig = Rig::with_range(40.0);
    rig.feed(8.0);
    assert!(rig.det.is_armed());

    assert!(!rig.elapse(749));
    assert!(rig.det.is_armed());
    assert!(rig.elapse(1));
    assert!(!rig.det.is_armed());

    assert_eq!(rig.feed(48.0), Step::Unchanged);
    assert!(rig.events().is_empty());
}

#[test]
fn stale_timeout_after_detection_is_harmless() {
    let mut rig = Rig::with_range(40.0);
    rig.feed(8.0);
    rig.feed(48.0);
    assert_eq!(rig.events().len(), 2);

    assert!(rig.elapse(750));
    assert!(!rig.det.is_armed());
    assert_eq!(rig.events().len(), 2);
}

#[test]
fn noise_never_changes_state() {
    let mut rig = Rig::with_range(40.0);
    for x in [0.5, 0.9, 0.2, -0.7, 0.0] {
        assert_eq!(rig.feed(x), Step::Noise);
        assert!(!rig.det.is_armed());
    }
    assert_eq!(rig.det.state().last_x, 0.0);

    rig.feed(8.0);
    for x in [8.5, 7.4, 8.9] {
        assert_eq!(rig.feed(x), Step::Noise);
        assert!(rig.det.is_armed());
    }
    assert!(rig.events().is_empty());
}

#[test]
fn face_up_suppresses_arming() {
    let mut rig = Rig::with_range(40.0);
    rig.det.orientation_mut().push(Orientation::FaceUp);
    assert_eq!(rig.feed(8.0), Step::Unchanged);
    assert!(!rig.det.is_armed());
    assert_eq!(rig.det.time_until_timeout(), None);

    rig.det.orientation_mut().push(Orientation::TopUp);
    assert_eq!(rig.feed(16.0), Step::Armed);
}

#[test]
fn rearming_restarts_the_window() {
    let mut rig = Rig::with_range(40.0);
    rig.feed(8.0);
    rig.elapse(700);
    assert!(rig.elapse(50));

    rig.feed(16.0);
    assert!(rig.det.is_armed());
    assert!(!rig.elapse(700));
    assert_eq!(rig.feed(56.0), Step::Confirmed);
}

#[test]
fn missing_range_falls_back() {
    let mut rig = Rig::new(Vec::new());
    assert_eq!(rig.det.state().accel_range, 44.0);

    // 13 arms under 0.3 * 44 = 13.2; confirm needs more than 41.8
    assert_eq!(rig.feed(13.0), Step::Armed);
    assert_eq!(rig.feed(54.0), Step::Unchanged);
    assert_eq!(rig.feed(96.0), Step::Confirmed);
}

#[test]
fn first_reported_range_wins() {
    let rig = Rig::new(vec![OutputRange::symmetric(20.0), OutputRange::symmetric(80.0)]);
    assert_eq!(rig.det.state().accel_range, 20.0);
}

#[test]
fn stop_and_start_are_idempotent() {
    let mut rig = Rig::with_range(40.0);
    assert!(rig.det.start());
    assert!(rig.det.is_active());
    assert_eq!(rig.det.is_active(), rig.det.accelerometer().is_active());

    rig.feed(8.0);
    assert!(rig.det.stop());
    assert!(!rig.det.is_armed());
    assert!(rig.det.stop());
    assert!(!rig.det.is_active());
    assert_eq!(rig.det.time_until_timeout(), None);

    // Unsubscribed: samples are ignored.
    assert_eq!(rig.feed(48.0), Step::Unchanged);
    assert_eq!(rig.det.state().last_x, 8.0);

    assert!(rig.det.start());
    assert_eq!(rig.feed(16.0), Step::Armed);
    assert_eq!(rig.feed(56.0), Step::Confirmed);
    assert_eq!(rig.events().len(), 2);
}

#[test]
fn identifier_is_stable() {
    let rig = Rig::with_range(40.0);
    assert_eq!(rig.det.identifier(), "QtSensors.whip");
}

mod replay {
    use super::*;
    use whip::feed::{self, SensorEvent};
    use whip::FeedClock;

    type ReplayDetector =
        WhipDetector<StreamAccelerometer, StreamOrientation, DeadlineTimer<FeedClock>>;

    fn replay_rig() -> (ReplayDetector, FeedClock, Rc<RefCell<Vec<GestureEvent>>>) {
        let clock = FeedClock::new();
        let mut det = WhipDetector::new(
            StreamAccelerometer::new(vec![OutputRange::symmetric(40.0)]),
            StreamOrientation::new(),
            DeadlineTimer::with_clock(clock.clone()),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        det.subscribe(move |e: &GestureEvent| sink.borrow_mut().push(e.clone()));
        det.start();
        (det, clock, events)
    }

    fn sample(x: f64, t: u64) -> SensorEvent {
        SensorEvent::Acceleration(Sample::new(x, 0.0, 0.0).at(t))
    }

    #[test]
    fn recorded_gap_past_window_is_not_a_whip() {
        let (mut det, clock, events) = replay_rig();

        assert_eq!(feed::deliver(&mut det, &clock, sample(0.0, 0)), Some(Step::Noise));
        assert_eq!(feed::deliver(&mut det, &clock, sample(8.0, 10)), Some(Step::Armed));
        assert_eq!(
            feed::deliver(&mut det, &clock, sample(48.0, 5000)),
            Some(Step::Unchanged)
        );

        assert!(clock.is_stamped());
        assert!(!det.is_armed());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn recorded_gap_inside_window_is_a_whip() {
        let (mut det, clock, events) = replay_rig();

        feed::deliver(&mut det, &clock, sample(8.0, 10));
        assert_eq!(
            feed::deliver(&mut det, &clock, sample(48.0, 700)),
            Some(Step::Confirmed)
        );
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn orientation_records_reach_the_detector() {
        let (mut det, clock, _events) = replay_rig();
        let face_up = SensorEvent::Orientation {
            orientation: Orientation::FaceUp,
        };

        assert_eq!(feed::deliver(&mut det, &clock, face_up), None);
        assert_eq!(
            feed::deliver(&mut det, &clock, sample(8.0, 10)),
            Some(Step::Unchanged)
        );
    }
}

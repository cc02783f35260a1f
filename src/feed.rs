//! Line-oriented sensor feed.
//!
//! Each line is one JSON record, either an acceleration sample
//! `{"x":..,"y":..,"z":..,"t":..}` or an orientation change
//! `{"orientation":"face_up"}`. Blank lines are skipped.
//!
//! When samples carry `t` stamps the timeout window is measured in feed time,
//! so a recorded file replays with the same gesture timing it was captured
//! with, however fast it is read.

use std::io::BufRead;
use std::sync::mpsc;
use std::thread;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::detector::{Step, WhipDetector};
use crate::error::{Error, Result};
use crate::sensor::{Orientation, Sample, StreamAccelerometer, StreamOrientation};
use crate::timer::{FeedClock, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SensorEvent {
    Orientation { orientation: Orientation },
    Acceleration(Sample),
}

/// Parse one feed line. `Ok(None)` for blank lines.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<SensorEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| Error::Parse {
            line: line_no,
            source,
        })
}

/// Decode one raw feed line, which may not be UTF-8.
pub fn decode_line(line_no: usize, bytes: Vec<u8>) -> Result<Option<SensorEvent>> {
    let line = String::from_utf8(bytes).map_err(|source| Error::Encoding {
        line: line_no,
        source,
    })?;
    parse_line(line_no, &line)
}

/// Read `reader` to the end, sending each record through `tx`.
///
/// Bad lines are logged and skipped. Returns when the reader is exhausted or
/// the receiver has hung up; other read errors end the feed.
pub fn pump<R: BufRead>(reader: R, tx: &mpsc::Sender<SensorEvent>) -> Result<usize> {
    let mut sent = 0;
    for (idx, line) in reader.split(b'\n').enumerate() {
        match decode_line(idx + 1, line?) {
            Ok(Some(event)) => {
                if tx.send(event).is_err() {
                    debug!("feed receiver closed");
                    break;
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("skipping record: {e}"),
        }
    }
    Ok(sent)
}

/// Hand one record to a stream-fed detector. Returns the evaluation step for
/// acceleration records.
pub fn deliver<T: Timer>(
    det: &mut WhipDetector<StreamAccelerometer, StreamOrientation, T>,
    clock: &FeedClock,
    event: SensorEvent,
) -> Option<Step> {
    match event {
        SensorEvent::Orientation { orientation } => {
            det.orientation_mut().push(orientation);
            None
        }
        SensorEvent::Acceleration(sample) => {
            clock.observe(sample.timestamp_ms);
            // A deadline that passed before this sample fires first.
            det.poll_timeout();
            det.accelerometer_mut().push(sample);
            Some(det.on_acceleration_changed())
        }
    }
}

/// Run `pump` on a dedicated thread.
pub fn spawn<R>(reader: R, tx: mpsc::Sender<SensorEvent>) -> thread::JoinHandle<Result<usize>>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || pump(reader, &tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_sample_line() {
        let event = parse_line(1, r#"{"x":8.0,"y":0.0,"z":0.5,"t":20}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            SensorEvent::Acceleration(Sample::new(8.0, 0.0, 0.5).at(20))
        );
    }

    #[test]
    fn parses_orientation_line() {
        let event = parse_line(1, r#" {"orientation":"face_up"} "#).unwrap().unwrap();
        assert_eq!(
            event,
            SensorEvent::Orientation {
                orientation: Orientation::FaceUp
            }
        );
    }

    #[test]
    fn blank_line_is_skipped() {
        assert!(parse_line(3, "   ").unwrap().is_none());
    }

    #[test]
    fn bad_line_reports_line_number() {
        let err = parse_line(7, r#"{"x":1.0}"#).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 7, .. }));
        assert!(err.to_string().starts_with("line 7:"));
    }

    #[test]
    fn pump_skips_garbage_and_forwards_the_rest() {
        let input = "{\"x\":0,\"y\":0,\"z\":0}\nnot json\n\n{\"orientation\":\"top_up\"}\n";
        let (tx, rx) = mpsc::channel();
        let sent = pump(Cursor::new(input), &tx).unwrap();
        drop(tx);

        assert_eq!(sent, 2);
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SensorEvent::Acceleration(_)));
        assert!(matches!(
            events[1],
            SensorEvent::Orientation {
                orientation: Orientation::TopUp
            }
        ));
    }

    #[test]
    fn non_utf8_line_is_skipped() {
        let mut input = b"{\"x\":0,\"y\":0,\"z\":0}\n".to_vec();
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(b"{\"x\":8,\"y\":0,\"z\":0}\n");

        let (tx, rx) = mpsc::channel();
        let sent = pump(Cursor::new(input), &tx).unwrap();
        drop(tx);

        assert_eq!(sent, 2);
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events[1],
            SensorEvent::Acceleration(Sample::new(8.0, 0.0, 0.0))
        );
    }

    #[test]
    fn non_utf8_line_reports_line_number() {
        let err = decode_line(4, vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::Encoding { line: 4, .. }));
    }

    #[test]
    fn crlf_lines_parse() {
        let event = decode_line(1, b"{\"orientation\":\"top_up\"}\r".to_vec())
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            SensorEvent::Orientation {
                orientation: Orientation::TopUp
            }
        );
    }
}

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::detector::HandDetector;
use crate::types::{Detections, Frame, MAX_HANDS};

/// How long a tick waits for a frame before polling the stop flag again.
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug)]
pub enum LoopEvent {
    Detections(Detections),
    DetectorFailed(String),
}

/// Handle to the detector worker; stopping or dropping it ends the loop
/// after the in-flight detection returns.
#[derive(Debug)]
pub struct FrameLoop<D> {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<D>>,
}

impl<D> FrameLoop<D> {
    /// Stops the worker and hands the detector back for the next stream.
    pub fn stop(mut self) -> Option<D> {
        self.shutdown()
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    fn shutdown(&mut self) -> Option<D> {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(detector) => Some(detector),
            Err(_) => {
                log::error!("prediction loop panicked");
                None
            }
        }
    }
}

impl<D> Drop for FrameLoop<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_frame_loop<D: HandDetector>(
    detector: D,
    frame_rx: Receiver<Frame>,
    event_tx: Sender<LoopEvent>,
) -> FrameLoop<D> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    log::info!("starting prediction loop");
    let handle = thread::spawn(move || {
        let detector = run_frame_loop(detector, &frame_rx, &event_tx, &stop_flag);
        log::info!("prediction loop stopped");
        detector
    });

    FrameLoop {
        stop,
        handle: Some(handle),
    }
}

fn run_frame_loop<D: HandDetector>(
    mut detector: D,
    frame_rx: &Receiver<Frame>,
    event_tx: &Sender<LoopEvent>,
    stop: &AtomicBool,
) -> D {
    let mut reported_failure = false;

    while !stop.load(Ordering::Relaxed) {
        let Some(frame) = recv_latest_frame(frame_rx) else {
            break;
        };
        let Some(frame) = frame.filter(Frame::has_pixels) else {
            // Nothing usable yet; poll again next tick.
            continue;
        };

        let event = match tick(&mut detector, &frame) {
            Ok(detections) => {
                reported_failure = false;
                LoopEvent::Detections(detections)
            }
            Err(err) => {
                log::warn!("hand estimation failed: {err:?}");
                if reported_failure {
                    continue;
                }
                reported_failure = true;
                LoopEvent::DetectorFailed(format!("{err:#}"))
            }
        };

        if event_tx.send(event).is_err() {
            break;
        }
    }
    detector
}

/// One detection step: estimate, then keep at most `MAX_HANDS`.
pub fn tick<D: HandDetector + ?Sized>(
    detector: &mut D,
    frame: &Frame,
) -> anyhow::Result<Detections> {
    let mut predictions = detector.estimate_hands(frame)?;
    if predictions.len() > MAX_HANDS {
        log::debug!(
            "{} hands detected, keeping the first {MAX_HANDS}",
            predictions.len()
        );
        predictions.truncate(MAX_HANDS);
    }
    Ok(Detections {
        frame_width: frame.width,
        frame_height: frame.height,
        predictions,
    })
}

/// Waits one poll interval for a frame and skips to the newest queued one.
/// `None` means the camera side hung up, `Some(None)` that no frame arrived.
fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Option<Frame>> {
    let mut frame = match frame_rx.recv_timeout(FRAME_POLL_INTERVAL) {
        Ok(frame) => frame,
        Err(RecvTimeoutError::Timeout) => return Some(None),
        Err(RecvTimeoutError::Disconnected) => return None,
    };
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(Some(frame))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Mutex, atomic::AtomicUsize},
        time::Instant,
    };

    use anyhow::anyhow;
    use crossbeam_channel::{bounded, unbounded};

    use super::*;
    use crate::{scene::tests::fixture_hand, types::HandPrediction};

    struct FakeDetector {
        hands: usize,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<Mutex<bool>>,
        fail: bool,
    }

    impl FakeDetector {
        fn new(hands: usize) -> Self {
            Self {
                hands,
                calls: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(Mutex::new(false)),
                fail: false,
            }
        }
    }

    impl HandDetector for FakeDetector {
        fn estimate_hands(&mut self, _frame: &Frame) -> anyhow::Result<Vec<HandPrediction>> {
            {
                let mut busy = self.in_flight.lock().unwrap();
                assert!(!*busy, "detector calls overlapped");
                *busy = true;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            *self.in_flight.lock().unwrap() = false;

            if self.fail {
                return Err(anyhow!("model exploded"));
            }
            Ok((0..self.hands)
                .map(|i| HandPrediction {
                    landmarks: fixture_hand(i as f32 * 50.0),
                    score: 0.9,
                })
                .collect())
        }
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            rgba: vec![0; (width * height * 4) as usize],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn tick_keeps_only_the_first_two_hands() {
        let mut detector = FakeDetector::new(4);
        let detections = tick(&mut detector, &frame(8, 6)).unwrap();
        assert_eq!(detections.predictions.len(), MAX_HANDS);
        assert_eq!(detections.predictions[0].landmarks, fixture_hand(0.0));
        assert_eq!(detections.predictions[1].landmarks, fixture_hand(50.0));
        assert_eq!((detections.frame_width, detections.frame_height), (8, 6));
    }

    #[test]
    fn tick_propagates_detector_errors() {
        let mut detector = FakeDetector::new(1);
        detector.fail = true;
        assert!(tick(&mut detector, &frame(4, 4)).is_err());
    }

    #[test]
    fn loop_emits_one_event_per_frame_and_stops() {
        let (frame_tx, frame_rx) = bounded(1);
        let (event_tx, event_rx) = unbounded();
        let detector = FakeDetector::new(1);
        let calls = detector.calls.clone();
        let worker = start_frame_loop(detector, frame_rx, event_tx);

        for _ in 0..3 {
            frame_tx.send(frame(4, 4)).unwrap();
            match event_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                LoopEvent::Detections(d) => assert_eq!(d.predictions.len(), 1),
                other => panic!("unexpected event {other:?}"),
            }
        }

        assert!(worker.stop().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_frames_are_skipped_without_detection() {
        let (frame_tx, frame_rx) = bounded(1);
        let (event_tx, event_rx) = unbounded();
        let detector = FakeDetector::new(1);
        let calls = detector.calls.clone();
        let worker = start_frame_loop(detector, frame_rx, event_tx);

        frame_tx.send(frame(0, 0)).unwrap();
        assert!(event_rx.recv_timeout(Duration::from_millis(100)).is_err());
        worker.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeated_failures_are_reported_once() {
        let (frame_tx, frame_rx) = bounded(1);
        let (event_tx, event_rx) = unbounded();
        let mut detector = FakeDetector::new(1);
        detector.fail = true;
        let calls = detector.calls.clone();
        let worker = start_frame_loop(detector, frame_rx, event_tx);

        frame_tx.send(frame(4, 4)).unwrap();
        assert!(matches!(
            event_rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            LoopEvent::DetectorFailed(_)
        ));
        frame_tx.send(frame(4, 4)).unwrap();
        while calls.load(Ordering::SeqCst) < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop();
        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn loop_ends_when_the_camera_hangs_up() {
        let (frame_tx, frame_rx) = bounded::<Frame>(1);
        let (event_tx, _event_rx) = unbounded();
        let worker = start_frame_loop(FakeDetector::new(0), frame_rx, event_tx);
        drop(frame_tx);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(worker.is_finished());
    }
}

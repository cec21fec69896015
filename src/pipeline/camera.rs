use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, bounded};
use nokhwa::{
    Camera, NokhwaError,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use super::rgba_converter;
use crate::{config::CameraConstraints, error::CameraError, types::Frame};

// Prefer formats that decode cheaply and that built-in cameras accept.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
];

// Names that usually belong to the user-facing camera.
const FRONT_FACING_HINTS: &[&str] = &["front", "facetime", "integrated", "built-in", "user"];

/// Back-to-back failed reads after which the device counts as gone.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 30;

fn requested_formats(constraints: &CameraConstraints) -> Vec<RequestedFormat<'static>> {
    let ideal = Resolution::new(constraints.ideal_width, constraints.ideal_height);
    let mut formats: Vec<RequestedFormat<'static>> = PREFERRED_PIXEL_FORMATS
        .iter()
        .map(|format| {
            RequestedFormat::with_formats(
                RequestedFormatType::Closest(CameraFormat::new(ideal, *format, 30)),
                PREFERRED_PIXEL_FORMATS,
            )
        })
        .collect();
    // Last resort: whatever the driver offers that Nokhwa can decode.
    formats.push(RequestedFormat::new::<RgbFormat>(
        RequestedFormatType::AbsoluteHighestFrameRate,
    ));
    formats.push(RequestedFormat::new::<RgbFormat>(RequestedFormatType::None));
    formats
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    failure_rx: Receiver<CameraError>,
}

impl CameraStream {
    /// Why the capture thread gave up, if it did.
    pub fn take_failure(&self) -> Option<CameraError> {
        self.failure_rx.try_recv().ok()
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>, CameraError> {
    if nokhwa::native_api_backend().is_none() {
        return Err(CameraError::Unsupported);
    }
    let cameras = query(ApiBackend::Auto).map_err(|err| CameraError::classify(&err))?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

/// Picks the pinned device if configured, else the first front-facing one,
/// else the first device.
pub fn choose_device<'a>(
    devices: &'a [CameraDevice],
    constraints: &CameraConstraints,
) -> Option<&'a CameraDevice> {
    if let Some(pinned) = constraints.device_index {
        return devices
            .iter()
            .find(|d| matches!(d.index, CameraIndex::Index(i) if i == pinned));
    }

    if constraints.prefer_front_facing {
        let front = devices.iter().find(|d| {
            let label = d.label.to_ascii_lowercase();
            FRONT_FACING_HINTS.iter().any(|hint| label.contains(hint))
        });
        if front.is_some() {
            return front;
        }
    }

    devices.first()
}

fn build_camera(
    index: &CameraIndex,
    constraints: &CameraConstraints,
) -> Result<Camera, NokhwaError> {
    let mut last_err = None;

    for requested in requested_formats(constraints) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err),
            },
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        NokhwaError::OpenDeviceError(
            format!("{index:?}"),
            "no supported capture format".to_string(),
        )
    }))
}

/// Opens the camera and spawns the capture thread. Each frame goes to both
/// the preview and the detector; a busy receiver just misses that frame.
pub fn start_camera_stream(
    device: &CameraDevice,
    constraints: &CameraConstraints,
    preview_tx: Sender<Frame>,
    detector_tx: Sender<Frame>,
) -> Result<CameraStream, CameraError> {
    // Fail fast before spawning the capture thread. The camera handle is not
    // `Send` on every backend, so the thread opens its own.
    let probe = build_camera(&device.index, constraints).map_err(|err| {
        log::error!("failed to open camera {}: {err}", device.label);
        CameraError::classify(&err)
    })?;
    let format = probe.camera_format();
    log::info!(
        "camera {} supports {}x{} {:?} @ {} fps",
        device.label,
        format.width(),
        format.height(),
        format.format(),
        format.frame_rate()
    );
    drop(probe);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let index = device.index.clone();
    let constraints = constraints.clone();

    let (failure_tx, failure_rx) = bounded(1);

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(&index, &constraints) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to reopen camera: {err:?}");
                let _ = failure_tx.try_send(CameraError::classify(&err));
                return;
            }
        };

        forward_frames(
            || read_frame(&mut camera),
            &stop_flag,
            preview_tx,
            detector_tx,
            &failure_tx,
        );

        if let Err(err) = camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
        failure_rx,
    })
}

/// Reads one frame. `Ok(None)` means it arrived but could not be decoded.
fn read_frame(camera: &mut Camera) -> Result<Option<Frame>, NokhwaError> {
    let buffer = camera.frame()?;
    match rgba_converter::convert_camera_frame(&buffer) {
        Ok(converted) => Ok(Some(Frame {
            rgba: converted.rgba,
            width: converted.width,
            height: converted.height,
            timestamp: Instant::now(),
        })),
        Err(err) => {
            log::warn!("failed to decode camera frame: {err:?}");
            Ok(None)
        }
    }
}

/// Pumps frames to both receivers until stopped. After too many failed
/// reads in a row the classified error is reported and the frame senders
/// are dropped, so the receivers see the stream end.
fn forward_frames<F>(
    mut read: F,
    stop: &AtomicBool,
    preview_tx: Sender<Frame>,
    detector_tx: Sender<Frame>,
    failure_tx: &Sender<CameraError>,
) where
    F: FnMut() -> Result<Option<Frame>, NokhwaError>,
{
    let mut failures = 0;

    while !stop.load(Ordering::Relaxed) {
        let frame = match read() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_READ_FAILURES {
                    log::error!("camera stopped delivering frames: {err}");
                    let _ = failure_tx.try_send(CameraError::classify(&err));
                    return;
                }
                log::warn!("camera frame read failed ({failures}): {err:?}");
                continue;
            }
        };
        failures = 0;

        let _ = detector_tx.try_send(frame.clone());
        let _ = preview_tx.try_send(frame);
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::TryRecvError;

    use super::*;

    fn tiny_frame() -> Frame {
        Frame {
            rgba: vec![0; 4],
            width: 1,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    fn device(index: u32, label: &str) -> CameraDevice {
        CameraDevice {
            index: CameraIndex::Index(index),
            label: label.to_string(),
        }
    }

    #[test]
    fn front_facing_camera_is_preferred() {
        let devices = vec![
            device(0, "USB Capture Card"),
            device(1, "FaceTime HD Camera"),
        ];
        let chosen = choose_device(&devices, &CameraConstraints::default()).unwrap();
        assert_eq!(chosen.label, "FaceTime HD Camera");
    }

    #[test]
    fn pinned_index_overrides_preference() {
        let devices = vec![device(0, "Integrated Webcam"), device(3, "External")];
        let constraints = CameraConstraints {
            device_index: Some(3),
            ..CameraConstraints::default()
        };
        assert_eq!(choose_device(&devices, &constraints).unwrap().label, "External");

        let missing = CameraConstraints {
            device_index: Some(9),
            ..CameraConstraints::default()
        };
        assert!(choose_device(&devices, &missing).is_none());
    }

    #[test]
    fn falls_back_to_first_device() {
        let devices = vec![device(0, "Capture A"), device(1, "Capture B")];
        assert_eq!(
            choose_device(&devices, &CameraConstraints::default()).unwrap().label,
            "Capture A"
        );
        assert!(choose_device(&[], &CameraConstraints::default()).is_none());
    }

    #[test]
    fn fallback_formats_follow_the_preferred_ones() {
        let formats = requested_formats(&CameraConstraints::default());
        assert_eq!(formats.len(), PREFERRED_PIXEL_FORMATS.len() + 2);
    }

    #[test]
    fn repeated_read_failures_end_the_stream() {
        let (preview_tx, preview_rx) = bounded(1);
        let (detector_tx, detector_rx) = bounded(1);
        let (failure_tx, failure_rx) = bounded(1);
        let stop = AtomicBool::new(false);
        let mut reads = 0;

        forward_frames(
            || {
                reads += 1;
                Err(NokhwaError::ReadFrameError("device unplugged".to_string()))
            },
            &stop,
            preview_tx,
            detector_tx,
            &failure_tx,
        );

        assert_eq!(reads, MAX_CONSECUTIVE_READ_FAILURES);
        assert!(matches!(failure_rx.try_recv(), Ok(CameraError::Other(_))));
        assert!(matches!(preview_rx.try_recv(), Err(TryRecvError::Disconnected)));
        assert!(matches!(detector_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn a_good_frame_resets_the_failure_count() {
        let (preview_tx, preview_rx) = bounded(1);
        let (detector_tx, _detector_rx) = bounded(1);
        let (failure_tx, failure_rx) = bounded(1);
        let stop = AtomicBool::new(false);
        let mut reads = 0u32;

        // Fails just short of the limit, delivers once, then fails again.
        forward_frames(
            || {
                reads += 1;
                if reads == MAX_CONSECUTIVE_READ_FAILURES {
                    Ok(Some(tiny_frame()))
                } else {
                    Err(NokhwaError::ReadFrameError("flaky".to_string()))
                }
            },
            &stop,
            preview_tx,
            detector_tx,
            &failure_tx,
        );

        assert_eq!(reads, 2 * MAX_CONSECUTIVE_READ_FAILURES);
        assert!(failure_rx.try_recv().is_ok());
        assert!(preview_rx.try_recv().is_ok());
        assert!(matches!(preview_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn stop_flag_ends_the_stream_without_a_failure() {
        let (preview_tx, preview_rx) = bounded(1);
        let (detector_tx, _detector_rx) = bounded(1);
        let (failure_tx, failure_rx) = bounded(1);
        let stop = AtomicBool::new(false);

        forward_frames(
            || {
                stop.store(true, Ordering::SeqCst);
                Ok(Some(tiny_frame()))
            },
            &stop,
            preview_tx,
            detector_tx,
            &failure_tx,
        );

        assert!(preview_rx.try_recv().is_ok());
        assert!(failure_rx.try_recv().is_err());
    }

    #[test]
    fn permission_errors_keep_their_classification() {
        let (preview_tx, _preview_rx) = bounded(1);
        let (detector_tx, _detector_rx) = bounded(1);
        let (failure_tx, failure_rx) = bounded(1);
        let stop = AtomicBool::new(false);

        forward_frames(
            || Err(NokhwaError::ReadFrameError("Permission denied".to_string())),
            &stop,
            preview_tx,
            detector_tx,
            &failure_tx,
        );

        assert_eq!(failure_rx.try_recv(), Ok(CameraError::PermissionDenied));
    }
}

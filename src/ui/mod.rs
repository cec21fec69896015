use std::{path::PathBuf, sync::Arc, thread};

use crossbeam_channel::{Receiver, TryRecvError, bounded, unbounded};
use gpui::{
    AnyElement, App, AppContext, Context, Hsla, InteractiveElement, IntoElement, ObjectFit,
    ParentElement, Render, RenderImage, SharedString, Styled, StyledImage, TitlebarOptions,
    Window, WindowControlArea, WindowDecorations, WindowOptions, div, img, px,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::AppConfig,
    error::{CameraError, ExportError, StartupError},
    export,
    pipeline::{
        CameraStream, FrameLoop, LoopEvent, OrtHandDetector, available_cameras, choose_device,
        start_camera_stream, start_frame_loop,
    },
    session::{LOADING_MODEL_MESSAGE, MirrorSession},
    types::Frame,
};

pub mod bindings;
mod main_view;
mod overlays;
mod render_util;
mod titlebar;

use bindings::{UiBindings, UiElement};
use render_util::{frame_to_image, rgba_to_image};

const WINDOW_TITLE: &str = "HOLO-Gen1";
const TITLEBAR_HEIGHT: f32 = 32.0;
const CONTROLS_HEIGHT: f32 = 64.0;
const PANE_GAP: f32 = 16.0;
const PANE_PADDING: f32 = 16.0;

type ExportJob = thread::JoinHandle<Result<Vec<PathBuf>, ExportError>>;

struct OpenedCamera {
    stream: CameraStream,
    preview_rx: Receiver<Frame>,
    detector_rx: Receiver<Frame>,
}

fn window_options() -> WindowOptions {
    WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some(WINDOW_TITLE.into()),
            appears_transparent: true,
            traffic_light_position: None,
        }),
        window_decorations: Some(WindowDecorations::Client),
        ..Default::default()
    }
}

pub fn launch_ui(app: &mut App, config: AppConfig, bindings: UiBindings) -> gpui::Result<()> {
    app.open_window(window_options(), move |window, app| {
        let view = app.new(|_| AppView::new(config, bindings));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

/// Opens a window that shows only the startup diagnostic.
pub fn launch_halted(app: &mut App, error: &StartupError) -> gpui::Result<()> {
    let message = SharedString::from(error.diagnostic());
    app.open_window(window_options(), move |window, app| {
        let view = app.new(|_| HaltedView { message });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct HaltedView {
    message: SharedString,
}

impl Render for HaltedView {
    fn render(&mut self, _: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        let theme = cx.theme();
        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                div()
                    .px_6()
                    .py_4()
                    .rounded_lg()
                    .border_1()
                    .border_color(gpui::rgba(0xef4444aa))
                    .bg(gpui::rgba(0x7f1d1d33))
                    .text_color(gpui::rgb(0xfca5a5))
                    .child(self.message.clone()),
            )
    }
}

struct AppView {
    config: AppConfig,
    session: MirrorSession,
    detector: Option<OrtHandDetector>,
    detector_load_rx: Option<Receiver<Result<OrtHandDetector, StartupError>>>,
    init_error: Option<SharedString>,
    camera_open_rx: Option<Receiver<Result<OpenedCamera, CameraError>>>,
    camera_stream: Option<CameraStream>,
    preview_rx: Option<Receiver<Frame>>,
    detector_rx: Option<Receiver<Frame>>,
    frame_loop: Option<FrameLoop<OrtHandDetector>>,
    loop_event_rx: Option<Receiver<LoopEvent>>,
    export_job: Option<ExportJob>,
    notice: Option<SharedString>,
    video_image: Option<Arc<RenderImage>>,
    mirror_image: Option<Arc<RenderImage>>,
    shown_scene_revision: Option<u64>,
    last_viewport: (u32, u32),
}

impl AppView {
    fn new(config: AppConfig, bindings: UiBindings) -> Self {
        let mut session = MirrorSession::new(bindings, &config);
        session.show_loading(LOADING_MODEL_MESSAGE);
        let detector_load_rx = spawn_detector_load(config.clone());

        Self {
            config,
            session,
            detector: None,
            detector_load_rx: Some(detector_load_rx),
            init_error: None,
            camera_open_rx: None,
            camera_stream: None,
            preview_rx: None,
            detector_rx: None,
            frame_loop: None,
            loop_event_rx: None,
            export_job: None,
            notice: None,
            video_image: None,
            mirror_image: None,
            shown_scene_revision: None,
            last_viewport: (0, 0),
        }
    }

    fn label(&self, element: UiElement) -> SharedString {
        SharedString::from(self.session.bindings().label(element).to_string())
    }

    fn poll_detector_load(&mut self) {
        let Some(rx) = self.detector_load_rx.as_ref() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(StartupError::Unclassified(
                "detector loader exited unexpectedly".to_string(),
            )),
        };
        self.detector_load_rx = None;

        match result {
            Ok(detector) => {
                self.detector = Some(detector);
                self.session.show_permission_modal();
            }
            Err(err) => {
                log::error!("critical initialization failed: {err}");
                self.session.hide_loading();
                self.init_error = Some(err.diagnostic().into());
            }
        }
    }

    fn grant_camera_access(&mut self) {
        if self.camera_open_rx.is_some() {
            return;
        }
        self.session.grant_camera_access();
        self.stop_pipeline();
        self.camera_open_rx = Some(spawn_camera_open(self.config.clone()));
    }

    fn poll_camera_open(&mut self) {
        let Some(rx) = self.camera_open_rx.as_ref() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                Err(CameraError::Other("camera thread exited".to_string()))
            }
        };
        self.camera_open_rx = None;

        match result {
            Ok(opened) => {
                self.camera_stream = Some(opened.stream);
                self.preview_rx = Some(opened.preview_rx);
                self.detector_rx = Some(opened.detector_rx);
                self.session.on_camera_opened();
            }
            Err(err) => self.session.on_camera_failed(err),
        }
    }

    fn poll_video_frames(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(rx) = self.preview_rx.as_ref() else {
            return;
        };

        let mut latest = None;
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if let Some(frame) = latest {
            if self.session.on_stream_ready(frame.width, frame.height) {
                self.start_prediction_loop();
            }
            if let Some(image) = frame_to_image(&frame) {
                if let Some(old) = self.video_image.replace(image) {
                    cx.drop_image(old, Some(window));
                }
            }
            self.session.on_video_frame(frame);
        }

        if disconnected {
            let err = self
                .camera_stream
                .as_ref()
                .and_then(CameraStream::take_failure)
                .unwrap_or_else(|| CameraError::Other("camera stream ended".to_string()));
            self.stop_pipeline();
            self.session.on_camera_failed(err);
        }
    }

    fn start_prediction_loop(&mut self) {
        let Some(detector) = self.detector.take() else {
            log::warn!("hand detector is not ready; prediction loop not started");
            return;
        };
        let Some(frame_rx) = self.detector_rx.take() else {
            log::warn!("missing frame receiver for prediction loop");
            self.detector = Some(detector);
            return;
        };

        let (event_tx, event_rx) = unbounded();
        self.frame_loop = Some(start_frame_loop(detector, frame_rx, event_tx));
        self.loop_event_rx = Some(event_rx);
    }

    fn poll_loop_events(&mut self) {
        let Some(rx) = self.loop_event_rx.as_ref() else {
            return;
        };

        let mut latest = None;
        let mut failure = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                LoopEvent::Detections(detections) => latest = Some(detections),
                LoopEvent::DetectorFailed(message) => failure = Some(message),
            }
        }

        if let Some(message) = failure {
            self.session.on_detector_failed(&message);
        }
        if let Some(detections) = latest {
            self.session.apply_detections(&detections);
        }
    }

    /// Stops the camera and the prediction loop, keeping the detector.
    fn stop_pipeline(&mut self) {
        if let Some(stream) = self.camera_stream.take() {
            stream.stop();
        }
        if let Some(frame_loop) = self.frame_loop.take() {
            if let Some(detector) = frame_loop.stop() {
                self.detector = Some(detector);
            }
        }
        self.preview_rx = None;
        self.detector_rx = None;
        self.loop_event_rx = None;
    }

    fn capture_image(&mut self) {
        if self.export_job.is_some() {
            return;
        }
        log::info!("capture image requested");
        let snapshots = self.session.capture_snapshots();
        self.export_job = Some(export::spawn_save(self.config.export_dir.clone(), snapshots));
    }

    fn poll_export(&mut self) {
        if !self.export_job.as_ref().is_some_and(|job| job.is_finished()) {
            return;
        }
        let Some(job) = self.export_job.take() else {
            return;
        };
        let result = job.join().unwrap_or_else(|_| {
            Err(ExportError::Io(std::io::Error::other(
                "export thread panicked",
            )))
        });
        self.session.finish_capture(result);
    }

    fn sync_scene_size(&mut self, window: &Window) {
        let viewport = window.viewport_size();
        let size = (f32::from(viewport.width) as u32, f32::from(viewport.height) as u32);
        if size == self.last_viewport {
            return;
        }
        self.last_viewport = size;

        let (width, height) = mirror_pane_size(size.0 as f32, size.1 as f32);
        self.session.resize_scene(width, height);
    }

    fn sync_scene_image(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let revision = self.session.scene_revision();
        if self.shown_scene_revision == Some(revision) {
            return;
        }
        let Some(image) = self.session.scene_image().and_then(rgba_to_image) else {
            return;
        };
        if let Some(old) = self.mirror_image.replace(image) {
            cx.drop_image(old, Some(window));
        }
        self.shown_scene_revision = Some(revision);
    }
}

impl Drop for AppView {
    fn drop(&mut self) {
        self.stop_pipeline();
    }
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.poll_detector_load();
        self.poll_camera_open();
        self.poll_video_frames(window, cx);
        self.poll_loop_events();
        self.poll_export();
        self.sync_scene_size(window);
        self.sync_scene_image(window, cx);
        if let Some(notice) = self.session.take_notice() {
            self.notice = Some(notice.into());
        }

        self.render_main(window, cx)
    }
}

/// Size of each of the two side-by-side panes for a given window size.
fn mirror_pane_size(window_width: f32, window_height: f32) -> (u32, u32) {
    let width = ((window_width - PANE_GAP - 2.0 * PANE_PADDING) / 2.0).max(1.0);
    let height = (window_height - TITLEBAR_HEIGHT - CONTROLS_HEIGHT - 2.0 * PANE_PADDING).max(0.0);
    (width as u32, height as u32)
}

fn spawn_detector_load(config: AppConfig) -> Receiver<Result<OrtHandDetector, StartupError>> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        log::info!("loading hand detector");
        let _ = tx.send(OrtHandDetector::load(&config));
    });
    rx
}

fn spawn_camera_open(config: AppConfig) -> Receiver<Result<OpenedCamera, CameraError>> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(open_camera(&config));
    });
    rx
}

fn open_camera(config: &AppConfig) -> Result<OpenedCamera, CameraError> {
    let devices = available_cameras()?;
    let device = choose_device(&devices, &config.camera)
        .cloned()
        .ok_or(CameraError::NotFound)?;
    log::info!("opening camera {}", device.label);

    let (preview_tx, preview_rx) = bounded(1);
    let (detector_tx, detector_rx) = bounded(1);
    let stream = start_camera_stream(&device, &config.camera, preview_tx, detector_tx)?;

    Ok(OpenedCamera {
        stream,
        preview_rx,
        detector_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panes_split_the_window_width() {
        let (width, height) = mirror_pane_size(1296.0, 640.0);
        assert_eq!(width, 624);
        assert_eq!(height, 512);
    }

    #[test]
    fn tiny_windows_collapse_the_pane_height() {
        let (width, height) = mirror_pane_size(100.0, 50.0);
        assert_eq!(width, 26);
        assert_eq!(height, 0);
    }
}

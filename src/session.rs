use image::RgbaImage;

use crate::{
    config::AppConfig,
    error::CameraError,
    export::{self, Snapshots},
    scene::{Renderer, Scene},
    types::{Detections, Frame, HandCount, MAX_HANDS},
    ui::bindings::{UiBindings, UiElement},
};

pub const LOADING_MODEL_MESSAGE: &str = "Loading Handpose model...";
pub const ACCESSING_CAMERA_MESSAGE: &str = "Attempting to access camera...";
pub const CAPTURING_MESSAGE: &str = "Capturing image...";
pub const CAPTURE_FAILED_NOTICE: &str = "Could not capture image. See log for details.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub camera_granted: bool,
    pub running: bool,
    pub hand_count: HandCount,
}

/// Everything the mirror window shows, driven by user actions and camera or
/// detector events. Lives on the UI thread; worker threads only feed it.
pub struct MirrorSession {
    bindings: UiBindings,
    state: SessionState,
    scene: Scene,
    renderer: Renderer,
    latest_frame: Option<Frame>,
    stream_size: Option<(u32, u32)>,
    camera_fallback: Option<CameraError>,
    loading_message: Option<String>,
    permission_modal_open: bool,
    help_modal_open: bool,
    presence_label: String,
    notice: Option<String>,
    scene_image: Option<RgbaImage>,
    scene_revision: u64,
}

impl MirrorSession {
    pub fn new(bindings: UiBindings, config: &AppConfig) -> Self {
        let loading = bindings.label(UiElement::LoadingMessage).to_string();
        let presence_label = bindings.label(UiElement::HandPresenceLabel).to_string();

        let mut session = Self {
            bindings,
            state: SessionState::default(),
            scene: Scene::new(),
            renderer: Renderer::new(config.scene_width, config.scene_height),
            latest_frame: None,
            stream_size: None,
            camera_fallback: None,
            loading_message: Some(loading),
            permission_modal_open: false,
            help_modal_open: false,
            presence_label,
            notice: None,
            scene_image: None,
            scene_revision: 0,
        };
        session.render();
        session
    }

    pub fn bindings(&self) -> &UiBindings {
        &self.bindings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn loading_message(&self) -> Option<&str> {
        self.loading_message.as_deref()
    }

    pub fn presence_label(&self) -> &str {
        &self.presence_label
    }

    pub fn camera_fallback(&self) -> Option<&CameraError> {
        self.camera_fallback.as_ref()
    }

    pub fn is_permission_modal_open(&self) -> bool {
        self.permission_modal_open
    }

    pub fn is_help_modal_open(&self) -> bool {
        self.help_modal_open
    }

    pub fn latest_frame(&self) -> Option<&Frame> {
        self.latest_frame.as_ref()
    }

    pub fn scene_image(&self) -> Option<&RgbaImage> {
        self.scene_image.as_ref()
    }

    /// Bumped every time the scene is redrawn so the view knows to upload it.
    pub fn scene_revision(&self) -> u64 {
        self.scene_revision
    }

    /// One-shot message for the user; cleared once read.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn show_loading(&mut self, message: impl Into<String>) {
        self.loading_message = Some(message.into());
    }

    pub fn hide_loading(&mut self) {
        self.loading_message = None;
    }

    pub fn show_permission_modal(&mut self) {
        self.hide_loading();
        log::info!("displaying camera permission modal");
        self.permission_modal_open = true;
    }

    /// Closes the permission modal. The caller opens the camera next.
    pub fn grant_camera_access(&mut self) {
        log::info!("camera access requested");
        self.permission_modal_open = false;
        self.show_loading(ACCESSING_CAMERA_MESSAGE);
    }

    pub fn on_camera_opened(&mut self) {
        log::info!("camera stream obtained");
        self.hide_loading();
        self.state.camera_granted = true;
        self.camera_fallback = None;
    }

    pub fn on_camera_failed(&mut self, err: CameraError) {
        log::error!("camera error: {err}");
        self.hide_loading();
        self.state.running = false;
        self.stream_size = None;
        self.camera_fallback = Some(err);
    }

    /// Records the stream size on the first non-empty frame. Returns `true`
    /// when the prediction loop should be started.
    pub fn on_stream_ready(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || self.state.running {
            return false;
        }
        log::info!("video stream ready at {width}x{height}");
        self.stream_size = Some((width, height));
        self.state.running = true;
        true
    }

    /// Pixel size of the running stream, recorded from its first frame.
    pub fn stream_size(&self) -> Option<(u32, u32)> {
        self.stream_size
    }

    pub fn on_video_frame(&mut self, frame: Frame) {
        self.latest_frame = Some(frame);
    }

    pub fn on_detector_failed(&mut self, message: &str) {
        log::error!("hand detection failed: {message}");
        self.notice = Some(format!("Hand detection error: {message}"));
    }

    /// Hides every slot, fills the first two from the detections, updates
    /// the presence label and redraws.
    pub fn apply_detections(&mut self, detections: &Detections) {
        self.scene.hide_all();

        let mut shown = 0;
        for (slot, prediction) in detections.predictions.iter().take(MAX_HANDS).enumerate() {
            if self.scene.update_hand(
                slot,
                &prediction.landmarks,
                detections.frame_width,
                detections.frame_height,
            ) {
                shown += 1;
            }
        }

        self.state.hand_count = HandCount::from_detected(shown);
        self.presence_label = presence_text(self.state.hand_count);
        self.render();
    }

    pub fn clear_3d_view(&mut self) {
        log::info!("clearing 3D view");
        self.scene.hide_all();
        self.state.hand_count = HandCount::None;
        self.presence_label = presence_text(HandCount::None);
        self.render();
    }

    pub fn open_help(&mut self) {
        self.help_modal_open = true;
    }

    pub fn close_help(&mut self) {
        self.help_modal_open = false;
    }

    /// Returns `true` when the 3D view changed size and was redrawn.
    pub fn resize_scene(&mut self, width: u32, height: u32) -> bool {
        let before = self.renderer.size();
        let after = self.renderer.resize(width, height);
        if before == after {
            return false;
        }
        self.render();
        true
    }

    #[cfg(test)]
    pub fn scene_size(&self) -> (u32, u32) {
        self.renderer.size()
    }

    /// Grabs both images for export and shows the capture overlay.
    pub fn capture_snapshots(&mut self) -> Snapshots {
        self.show_loading(CAPTURING_MESSAGE);
        let (width, height) = self.renderer.size();
        Snapshots {
            live_feed: export::capture_live_feed(self.latest_frame.as_ref()),
            mirror: export::capture_scene(self.scene_image.as_ref(), width, height),
        }
    }

    pub fn finish_capture<T, E: std::fmt::Display>(&mut self, result: Result<T, E>) {
        self.hide_loading();
        if let Err(err) = result {
            log::error!("capture failed: {err}");
            self.notice = Some(CAPTURE_FAILED_NOTICE.to_string());
        }
    }

    fn render(&mut self) {
        self.scene_image = Some(self.renderer.render(&mut self.scene));
        self.scene_revision = self.scene_revision.wrapping_add(1);
    }
}

pub fn presence_text(count: HandCount) -> String {
    match count {
        HandCount::None => "Hands: Not Detected".to_string(),
        n => format!("Hands: {} Detected", n.as_usize()),
    }
}

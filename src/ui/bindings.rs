use std::collections::HashMap;

use crate::error::StartupError;

/// Every control and surface the mirror window is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UiElement {
    WebcamVideo,
    VideoContainer,
    NoCameraFallback,
    MirrorContainer,
    LoadingOverlay,
    LoadingMessage,
    PermissionModal,
    GrantCameraButton,
    HelpModal,
    HelpButton,
    CloseHelpModalButton,
    HandPresenceLabel,
    CaptureImageButton,
    ClearAllButton,
}

impl UiElement {
    pub const ALL: [UiElement; 14] = [
        UiElement::WebcamVideo,
        UiElement::VideoContainer,
        UiElement::NoCameraFallback,
        UiElement::MirrorContainer,
        UiElement::LoadingOverlay,
        UiElement::LoadingMessage,
        UiElement::PermissionModal,
        UiElement::GrantCameraButton,
        UiElement::HelpModal,
        UiElement::HelpButton,
        UiElement::CloseHelpModalButton,
        UiElement::HandPresenceLabel,
        UiElement::CaptureImageButton,
        UiElement::ClearAllButton,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            UiElement::WebcamVideo => "webcam-video",
            UiElement::VideoContainer => "video-container",
            UiElement::NoCameraFallback => "no-camera-fallback",
            UiElement::MirrorContainer => "threejs-container",
            UiElement::LoadingOverlay => "loading-overlay",
            UiElement::LoadingMessage => "loading-message",
            UiElement::PermissionModal => "permission-modal-overlay",
            UiElement::GrantCameraButton => "grant-camera-button",
            UiElement::HelpModal => "help-modal-overlay",
            UiElement::HelpButton => "help-btn",
            UiElement::CloseHelpModalButton => "close-help-modal-btn",
            UiElement::HandPresenceLabel => "hand-presence-label",
            UiElement::CaptureImageButton => "capture-image-btn",
            UiElement::ClearAllButton => "clear-all-btn",
        }
    }
}

/// Window layout: element id and the text it shows.
pub const DEFAULT_LAYOUT: &[(&str, &str)] = &[
    ("webcam-video", "Live Feed"),
    ("video-container", "Camera"),
    ("no-camera-fallback", "Camera unavailable"),
    ("threejs-container", "3D Mirror"),
    ("loading-overlay", "Loading"),
    ("loading-message", "Initializing HOLO-Gen1 Hand Tracking..."),
    ("permission-modal-overlay", "HOLO-Gen1 needs your camera to mirror your hands."),
    ("grant-camera-button", "Grant Camera Access"),
    ("help-modal-overlay", "Hold one or two hands in front of the camera. The 3D view mirrors them live. Capture Image saves the feed and the mirror as PNG files."),
    ("help-btn", "Help"),
    ("close-help-modal-btn", "Close"),
    ("hand-presence-label", "Hands: Not Detected"),
    ("capture-image-btn", "Capture Image"),
    ("clear-all-btn", "Clear 3D View"),
];

/// Resolved element ids and labels, validated once at startup.
#[derive(Clone, Debug)]
pub struct UiBindings {
    labels: HashMap<UiElement, String>,
}

impl UiBindings {
    pub fn resolve(layout: &[(&str, &str)]) -> Result<Self, StartupError> {
        let table: HashMap<&str, &str> = layout.iter().copied().collect();
        let mut labels = HashMap::with_capacity(UiElement::ALL.len());

        for element in UiElement::ALL {
            let Some(label) = table.get(element.id()) else {
                log::error!(
                    "UI element with id '{}' not found in layout",
                    element.id()
                );
                return Err(StartupError::MissingElement {
                    id: element.id().to_string(),
                });
            };
            labels.insert(element, label.to_string());
        }

        log::info!("all {} UI elements resolved", labels.len());
        Ok(Self { labels })
    }

    pub fn label(&self, element: UiElement) -> &str {
        // Every element is present after `resolve`.
        self.labels.get(&element).map(String::as_str).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_binds_every_element() {
        let bindings = UiBindings::resolve(DEFAULT_LAYOUT).unwrap();
        assert_eq!(
            bindings.label(UiElement::ClearAllButton),
            "Clear 3D View"
        );
        assert_eq!(
            bindings.label(UiElement::HandPresenceLabel),
            "Hands: Not Detected"
        );
    }

    #[test]
    fn missing_element_is_reported_by_id() {
        let layout: Vec<(&str, &str)> = DEFAULT_LAYOUT
            .iter()
            .copied()
            .filter(|(id, _)| *id != "grant-camera-button")
            .collect();
        let err = UiBindings::resolve(&layout).unwrap_err();
        match err {
            StartupError::MissingElement { id } => assert_eq!(id, "grant-camera-button"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<&str> = UiElement::ALL.iter().map(|e| e.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), UiElement::ALL.len());
    }
}

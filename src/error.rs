use thiserror::Error;

use crate::probe::Dependency;

/// Failures that stop the app before any control is wired up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{} is not available", .0.name())]
    MissingDependency(Dependency),
    #[error("UI element '{id}' is missing")]
    MissingElement { id: String },
    #[error("failed to load hand detector: {0}")]
    DetectorLoad(String),
    #[error("initialization failed: {0}")]
    Unclassified(String),
}

impl StartupError {
    /// Text shown in place of the app when startup halts.
    pub fn diagnostic(&self) -> String {
        match self {
            StartupError::MissingDependency(dep) => {
                format!("Error: {} failed to load. Check the log.", dep.name())
            }
            StartupError::MissingElement { id } => {
                format!("Error: UI element '{id}' missing. App cannot start.")
            }
            StartupError::DetectorLoad(message) | StartupError::Unclassified(message) => {
                format!("App Init Error: {message}. Check the log.")
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera access denied")]
    PermissionDenied,
    #[error("no camera found")]
    NotFound,
    #[error("camera capture is not supported")]
    Unsupported,
    #[error("camera error: {0}")]
    Other(String),
}

impl CameraError {
    pub fn classify(err: &nokhwa::NokhwaError) -> Self {
        use nokhwa::NokhwaError;

        match err {
            NokhwaError::UnsupportedOperationError(_) | NokhwaError::NotImplementedError(_) => {
                CameraError::Unsupported
            }
            other => classify_message(&other.to_string()),
        }
    }

    /// Headline and guidance line of the fallback panel.
    pub fn fallback_text(&self) -> (String, String) {
        match self {
            CameraError::PermissionDenied => (
                "⚠️ Camera access denied by user.".to_string(),
                "Please enable camera permissions in your system settings and restart.".to_string(),
            ),
            CameraError::NotFound => (
                "⚠️ No camera found.".to_string(),
                "Please connect a camera and restart.".to_string(),
            ),
            CameraError::Unsupported => (
                "⚠️ Camera capture is not supported on this platform.".to_string(),
                "Try a different machine or camera driver.".to_string(),
            ),
            CameraError::Other(name) => (
                format!("⚠️ Error accessing camera: {name}"),
                "Try restarting or checking camera connections.".to_string(),
            ),
        }
    }
}

/// Platform backends report permission and device problems only as text.
pub(crate) fn classify_message(message: &str) -> CameraError {
    let lower = message.to_ascii_lowercase();
    const DENIED: &[&str] = &[
        "permission",
        "denied",
        "not authorized",
        "notallowed",
        "unauthorized",
    ];
    const MISSING: &[&str] = &[
        "not found",
        "notfound",
        "no such device",
        "no device",
        "does not exist",
    ];

    if DENIED.iter().any(|needle| lower.contains(needle)) {
        CameraError::PermissionDenied
    } else if MISSING.iter().any(|needle| lower.contains(needle)) {
        CameraError::NotFound
    } else {
        CameraError::Other(message.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode snapshot {filename}: {source}")]
    Encode {
        filename: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to prepare export directory: {0}")]
    Io(#[from] std::io::Error),
}

use std::path::PathBuf;

use crate::{config::AppConfig, error::StartupError};

/// External pieces the mirror cannot run without.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dependency {
    InferenceRuntime,
    HandposeModel,
    PalmModel,
    CameraBackend,
}

impl Dependency {
    /// Checked in this order; the first missing one is reported.
    pub const ALL: [Dependency; 4] = [
        Dependency::InferenceRuntime,
        Dependency::HandposeModel,
        Dependency::PalmModel,
        Dependency::CameraBackend,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dependency::InferenceRuntime => "ONNX Runtime",
            Dependency::HandposeModel => "handpose estimator model",
            Dependency::PalmModel => "palm detector model",
            Dependency::CameraBackend => "native camera backend",
        }
    }
}

pub trait CapabilitySource {
    fn is_available(&self, dependency: Dependency) -> bool;
}

pub fn probe_capabilities<S: CapabilitySource + ?Sized>(source: &S) -> Result<(), StartupError> {
    for dependency in Dependency::ALL {
        if !source.is_available(dependency) {
            log::error!("startup halted: {} is not available", dependency.name());
            return Err(StartupError::MissingDependency(dependency));
        }
        log::info!("{} is available", dependency.name());
    }
    Ok(())
}

/// Probes the real runtime, model files and camera backend.
pub struct RuntimeCapabilities {
    handpose_model: PathBuf,
    palm_model: PathBuf,
}

impl RuntimeCapabilities {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            handpose_model: config.handpose_estimator_model_path(),
            palm_model: config.palm_detector_model_path(),
        }
    }
}

impl CapabilitySource for RuntimeCapabilities {
    fn is_available(&self, dependency: Dependency) -> bool {
        match dependency {
            // Building a session builder loads the runtime library.
            Dependency::InferenceRuntime => match ort::session::Session::builder() {
                Ok(_) => true,
                Err(err) => {
                    log::error!("failed to initialise ONNX Runtime: {err:?}");
                    false
                }
            },
            Dependency::HandposeModel => self.handpose_model.is_file(),
            Dependency::PalmModel => self.palm_model.is_file(),
            Dependency::CameraBackend => nokhwa::native_api_backend().is_some(),
        }
    }
}

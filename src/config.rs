use std::{env, path::PathBuf, str::FromStr};

use crate::model_download::{HANDPOSE_ESTIMATOR_MODEL_FILENAME, PALM_DETECTOR_MODEL_FILENAME};

const MODEL_DIR_VAR: &str = "HOLOGEN_MODEL_DIR";
const EXPORT_DIR_VAR: &str = "HOLOGEN_EXPORT_DIR";
const CAMERA_INDEX_VAR: &str = "HOLOGEN_CAMERA_INDEX";
const CAMERA_WIDTH_VAR: &str = "HOLOGEN_CAMERA_WIDTH";
const CAMERA_HEIGHT_VAR: &str = "HOLOGEN_CAMERA_HEIGHT";

/// Preferred capture settings; the driver picks the closest mode it has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub prefer_front_facing: bool,
    /// Pins a device index instead of picking the front-facing one.
    pub device_index: Option<u32>,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 640,
            ideal_height: 480,
            prefer_front_facing: true,
            device_index: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model_dir: PathBuf,
    pub export_dir: PathBuf,
    pub camera: CameraConstraints,
    pub scene_width: u32,
    pub scene_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            export_dir: PathBuf::from("captures"),
            camera: CameraConstraints::default(),
            scene_width: 640,
            scene_height: 480,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies overrides on top of the defaults; unparsable values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(MODEL_DIR_VAR).filter(|v| !v.is_empty()) {
            config.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(EXPORT_DIR_VAR).filter(|v| !v.is_empty()) {
            config.export_dir = PathBuf::from(dir);
        }
        if let Some(index) = parse_var::<u32, _>(&lookup, CAMERA_INDEX_VAR) {
            config.camera.device_index = Some(index);
        }
        if let Some(width) = parse_var::<u32, _>(&lookup, CAMERA_WIDTH_VAR).filter(|w| *w > 0) {
            config.camera.ideal_width = width;
        }
        if let Some(height) = parse_var::<u32, _>(&lookup, CAMERA_HEIGHT_VAR).filter(|h| *h > 0) {
            config.camera.ideal_height = height;
        }

        config
    }

    pub fn handpose_estimator_model_path(&self) -> PathBuf {
        self.model_dir.join(HANDPOSE_ESTIMATOR_MODEL_FILENAME)
    }

    pub fn palm_detector_model_path(&self) -> PathBuf {
        self.model_dir.join(PALM_DETECTOR_MODEL_FILENAME)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_preferred_capture_mode() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.camera.ideal_width, 640);
        assert_eq!(config.camera.ideal_height, 480);
        assert!(config.camera.prefer_front_facing);
        assert_eq!(config.camera.device_index, None);
        assert_eq!(
            config.palm_detector_model_path(),
            PathBuf::from("models").join(PALM_DETECTOR_MODEL_FILENAME)
        );
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (MODEL_DIR_VAR, "/opt/hologen/models"),
            (EXPORT_DIR_VAR, "/tmp/shots"),
            (CAMERA_INDEX_VAR, "2"),
            (CAMERA_WIDTH_VAR, "1280"),
        ]));
        assert_eq!(config.model_dir, PathBuf::from("/opt/hologen/models"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.camera.device_index, Some(2));
        assert_eq!(config.camera.ideal_width, 1280);
        assert_eq!(config.camera.ideal_height, 480);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (CAMERA_INDEX_VAR, "front"),
            (CAMERA_HEIGHT_VAR, "0"),
        ]));
        assert_eq!(config.camera.device_index, None);
        assert_eq!(config.camera.ideal_height, 480);
    }
}

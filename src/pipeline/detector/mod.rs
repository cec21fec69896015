mod crop;
mod ort;
mod palm;

use crate::types::{Frame, HandPrediction};

pub use self::ort::OrtHandDetector;

/// Estimates every hand visible in a frame. Predictions come back in the
/// detector's own order; callers decide how many to use.
pub trait HandDetector: Send + 'static {
    fn estimate_hands(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandPrediction>>;
}

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandDetector,
    crop::{self, HANDPOSE_INPUT_SIZE},
    palm::{PalmDetector, PalmDetectorConfig, crop_from_palm},
};
use crate::{
    config::AppConfig,
    error::StartupError,
    types::{Frame, HandPrediction, MAX_HANDS, PalmRegion},
};

/// Below this handpose confidence a palm crop is treated as a false positive.
const MIN_HAND_CONFIDENCE: f32 = 0.2;

/// MediaPipe palm detector followed by the handpose estimator on each palm.
pub struct OrtHandDetector {
    handpose: Session,
    palm_detector: PalmDetector,
}

impl OrtHandDetector {
    pub fn load(config: &AppConfig) -> Result<Self, StartupError> {
        let handpose_path = config.handpose_estimator_model_path();
        let palm_path = config.palm_detector_model_path();

        let detector = Self::from_paths(&handpose_path, &palm_path)
            .map_err(|err| StartupError::DetectorLoad(format!("{err:#}")))?;

        log::info!(
            "handpose ORT backend ready using {} and palm detector {}",
            handpose_path.display(),
            palm_path.display()
        );
        Ok(detector)
    }

    fn from_paths(handpose_path: &Path, palm_path: &Path) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_path)
            .with_context(|| {
                format!(
                    "failed to load ORT session from {}",
                    handpose_path.display()
                )
            })?;

        let palm_detector = PalmDetector::new(palm_path, PalmDetectorConfig::default())?;

        Ok(Self {
            handpose,
            palm_detector,
        })
    }

    fn estimate_region(
        &mut self,
        frame: &Frame,
        center: (f32, f32),
        side: f32,
        angle: f32,
    ) -> Result<Option<HandPrediction>> {
        let (input, transform) =
            crop::rotated_crop(frame, center, side, angle, HANDPOSE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = crop::decode_landmarks(&flattened, &transform)?;

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            1.0
        };

        if confidence < MIN_HAND_CONFIDENCE {
            return Ok(None);
        }

        Ok(Some(HandPrediction {
            landmarks,
            score: confidence,
        }))
    }
}

impl HandDetector for OrtHandDetector {
    fn estimate_hands(&mut self, frame: &Frame) -> Result<Vec<HandPrediction>> {
        let regions = self.palm_detector.detect(frame)?;
        collect_hands(&regions, |region| {
            let (center, side, angle) = crop_from_palm(region);
            self.estimate_region(frame, center, side, angle)
        })
    }
}

/// Runs the estimator on palms in score order and stops once `MAX_HANDS`
/// hands have passed the confidence gate.
fn collect_hands<F>(regions: &[PalmRegion], mut estimate: F) -> Result<Vec<HandPrediction>>
where
    F: FnMut(&PalmRegion) -> Result<Option<HandPrediction>>,
{
    let mut predictions = Vec::with_capacity(MAX_HANDS);
    for region in regions {
        if predictions.len() == MAX_HANDS {
            break;
        }
        if let Some(mut prediction) = estimate(region)? {
            prediction.score = (prediction.score * region.score).clamp(0.0, 1.0);
            predictions.push(prediction);
        }
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::fixture_hand;

    fn region(score: f32) -> PalmRegion {
        PalmRegion {
            bbox: [0.0, 0.0, 10.0, 10.0],
            landmarks: Vec::new(),
            score,
        }
    }

    #[test]
    fn estimation_stops_after_two_hands() {
        let regions = vec![region(0.9), region(0.8), region(0.7), region(0.6)];
        let mut calls = 0;

        let hands = collect_hands(&regions, |_| {
            calls += 1;
            Ok(Some(HandPrediction {
                landmarks: fixture_hand(0.0),
                score: 1.0,
            }))
        })
        .unwrap();

        assert_eq!(hands.len(), MAX_HANDS);
        assert_eq!(calls, MAX_HANDS);
        assert!((hands[0].score - 0.9).abs() < 1e-6);
        assert!((hands[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn rejected_crops_do_not_count_towards_the_limit() {
        let regions = vec![region(0.9), region(0.8), region(0.7), region(0.6)];
        let mut calls = 0;

        let hands = collect_hands(&regions, |region| {
            calls += 1;
            // The second palm is a false positive.
            Ok((region.score != 0.8).then(|| HandPrediction {
                landmarks: fixture_hand(0.0),
                score: 0.5,
            }))
        })
        .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(hands.len(), MAX_HANDS);
        assert!((hands[1].score - 0.35).abs() < 1e-6);
    }

    #[test]
    fn estimator_errors_propagate() {
        let regions = vec![region(0.9)];
        assert!(collect_hands(&regions, |_| Err(anyhow!("session failed"))).is_err());
    }
}

use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::crop::{LetterboxInfo, PALM_INPUT_SIZE, letterbox};
use crate::types::{Frame, PalmRegion};

const PALM_LANDMARKS: usize = 7;

/// SSD feature maps of the 192px palm model: (cells per side, anchors per cell).
const ANCHOR_LAYERS: [(usize, usize); 2] = [(24, 2), (12, 6)];

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 8,
        }
    }
}

/// Anchor centres in normalised input coordinates, in model output order.
fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::new();
    for (cells, per_cell) in ANCHOR_LAYERS {
        for y in 0..cells {
            for x in 0..cells {
                let centre = [
                    (x as f32 + 0.5) / cells as f32,
                    (y as f32 + 0.5) / cells as f32,
                ];
                anchors.extend(std::iter::repeat_n(centre, per_cell));
            }
        }
    }
    anchors
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: generate_anchors(),
            cfg,
        })
    }

    /// Palm regions in frame pixels, best score first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let feature_dim = *boxes
            .shape()
            .last()
            .ok_or_else(|| anyhow!("palm box output has no dimensions"))?;

        decode_palms(
            boxes
                .as_slice()
                .ok_or_else(|| anyhow!("palm boxes not contiguous"))?,
            feature_dim,
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("palm scores not contiguous"))?,
            &self.anchors,
            &letterbox,
            &self.cfg,
        )
    }
}

fn decode_palms(
    boxes: &[f32],
    feature_dim: usize,
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &LetterboxInfo,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    if feature_dim < 4 + PALM_LANDMARKS * 2 {
        return Err(anyhow!("palm box feature dimension too small: {feature_dim}"));
    }

    let input = PALM_INPUT_SIZE as f32;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let bias_x = letterbox.pad_x / letterbox.scale;
    let bias_y = letterbox.pad_y / letterbox.scale;
    let to_frame = |nx: f32, ny: f32| (nx * scale - bias_x, ny * scale - bias_y);

    let mut candidates = Vec::new();
    for ((features, raw_score), anchor) in boxes
        .chunks_exact(feature_dim)
        .zip(scores.iter())
        .zip(anchors.iter())
    {
        let score = sigmoid(*raw_score);
        if score < cfg.score_threshold {
            continue;
        }

        let cx = features[0] / input + anchor[0];
        let cy = features[1] / input + anchor[1];
        let hw = features[2] / input / 2.0;
        let hh = features[3] / input / 2.0;
        let (x1, y1) = to_frame(cx - hw, cy - hh);
        let (x2, y2) = to_frame(cx + hw, cy + hh);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let max_w = letterbox.orig_w.saturating_sub(1) as f32;
        let max_h = letterbox.orig_h.saturating_sub(1) as f32;
        let landmarks = features[4..4 + PALM_LANDMARKS * 2]
            .chunks_exact(2)
            .map(|p| to_frame(p[0] / input + anchor[0], p[1] / input + anchor[1]))
            .collect();

        candidates.push(PalmRegion {
            bbox: [
                x1.clamp(0.0, max_w),
                y1.clamp(0.0, max_h),
                x2.clamp(0.0, max_w),
                y2.clamp(0.0, max_h),
            ],
            landmarks,
            score,
        });
    }

    Ok(nms(candidates, cfg.nms_threshold, cfg.top_k))
}

/// Square crop side, centre and rotation that frame the whole hand.
pub fn crop_from_palm(region: &PalmRegion) -> ((f32, f32), f32, f32) {
    let center = if region.landmarks.is_empty() {
        (
            (region.bbox[0] + region.bbox[2]) * 0.5,
            (region.bbox[1] + region.bbox[3]) * 0.5,
        )
    } else {
        let n = region.landmarks.len() as f32;
        let (sx, sy) = region
            .landmarks
            .iter()
            .fold((0.0_f32, 0.0_f32), |acc, p| (acc.0 + p.0, acc.1 + p.1));
        (sx / n, sy / n)
    };

    let base = (region.bbox[2] - region.bbox[0])
        .abs()
        .max((region.bbox[3] - region.bbox[1]).abs());
    let span = region
        .landmarks
        .iter()
        .fold(None, |acc: Option<(f32, f32, f32, f32)>, &(x, y)| {
            Some(match acc {
                None => (x, x, y, y),
                Some((a, b, c, d)) => (a.min(x), b.max(x), c.min(y), d.max(y)),
            })
        })
        .map(|(min_x, max_x, min_y, max_y)| (max_x - min_x).max(max_y - min_y))
        .unwrap_or(0.0);
    // Palms are much smaller than the full hand.
    let side = base.max(span).max(80.0) * 2.4;

    (center, side, estimate_orientation(region))
}

/// Principal axis of the palm keypoints, rotated so fingers point up.
fn estimate_orientation(region: &PalmRegion) -> f32 {
    let n = region.landmarks.len();
    if n < 2 {
        return 0.0;
    }

    let (sx, sy) = region
        .landmarks
        .iter()
        .fold((0.0_f32, 0.0_f32), |acc, (x, y)| (acc.0 + x, acc.1 + y));
    let mean = (sx / n as f32, sy / n as f32);

    let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
    for (x, y) in &region.landmarks {
        let (dx, dy) = (x - mean.0, y - mean.1);
        xx += dx * dx;
        xy += dx * dy;
        yy += dy * dy;
    }
    let (xx, xy, yy) = (xx / n as f32, xy / n as f32, yy / n as f32);

    let half_trace = (xx + yy) * 0.5;
    let det = xx * yy - xy * xy;
    let lambda = (half_trace + (half_trace * half_trace - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if xy.abs() > 1e-6 {
        (lambda - yy, xy)
    } else if xx >= yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - PI * 0.5
}

fn nms(mut candidates: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if keep.len() >= top_k {
            break;
        }
        if keep
            .iter()
            .all(|kept| iou(&candidate.bbox, &kept.bbox) < threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

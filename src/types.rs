use std::time::Instant;

pub const NUM_LANDMARKS: usize = 21;

/// Maximum number of detected hands the mirror renders per frame.
pub const MAX_HANDS: usize = 2;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl Frame {
    pub fn has_pixels(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.rgba.is_empty()
    }
}

/// 21 keypoints of one hand: x and y in source-frame pixels, z relative depth.
pub type Landmarks = [[f32; 3]; NUM_LANDMARKS];

#[derive(Clone, Debug, PartialEq)]
pub struct HandPrediction {
    pub landmarks: Landmarks,
    pub score: f32,
}

/// Output of one frame tick of the detector worker.
#[derive(Clone, Debug)]
pub struct Detections {
    pub frame_width: u32,
    pub frame_height: u32,
    pub predictions: Vec<HandPrediction>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandCount {
    #[default]
    None,
    One,
    Two,
}

impl HandCount {
    pub fn from_detected(count: usize) -> Self {
        match count.min(MAX_HANDS) {
            0 => HandCount::None,
            1 => HandCount::One,
            _ => HandCount::Two,
        }
    }

    pub fn as_usize(&self) -> usize {
        match self {
            HandCount::None => 0,
            HandCount::One => 1,
            HandCount::Two => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

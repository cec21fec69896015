//! Two hand skeletons mirrored from detector landmarks.
//!
//! Topology never changes after construction; each frame only rewrites the
//! marker positions and the bone endpoints derived from them.

mod raster;
pub mod text;
mod topology;

use glam::Vec3;

use crate::types::{Landmarks, MAX_HANDS, NUM_LANDMARKS};

pub use raster::Renderer;
pub use topology::{BONES, NUM_BONES};

/// The detector's depth has low dynamic range and an arbitrary scale.
pub const DEPTH_SCALE: f32 = 0.001;

pub const HAND_COLOR_PRIMARY: [u8; 3] = [0x00, 0xff, 0xff];
pub const HAND_COLOR_SECONDARY: [u8; 3] = [0xff, 0x00, 0xff];

/// Maps a landmark in source-frame pixels into scene space, flipping x so the
/// mirror matches a mirrored camera preview.
pub fn to_scene_point(landmark: [f32; 3], frame_width: u32, frame_height: u32) -> Vec3 {
    let w = frame_width as f32;
    let h = frame_height as f32;
    let [x, y, z] = landmark;
    Vec3::new((w - x) / w - 0.5, -(y / h - 0.5), -z * DEPTH_SCALE)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneSegment {
    pub start: Vec3,
    pub end: Vec3,
    /// Set when the endpoints changed since the last draw.
    pub dirty: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandVisual {
    pub markers: [Vec3; NUM_LANDMARKS],
    pub bones: [BoneSegment; NUM_BONES],
    pub visible: bool,
    pub color: [u8; 3],
}

impl HandVisual {
    fn new(color: [u8; 3]) -> Self {
        Self {
            markers: [Vec3::ZERO; NUM_LANDMARKS],
            bones: [BoneSegment {
                start: Vec3::ZERO,
                end: Vec3::ZERO,
                dirty: false,
            }; NUM_BONES],
            visible: false,
            color,
        }
    }

    fn apply(&mut self, landmarks: &Landmarks, frame_width: u32, frame_height: u32) {
        for (marker, landmark) in self.markers.iter_mut().zip(landmarks.iter()) {
            *marker = to_scene_point(*landmark, frame_width, frame_height);
        }

        for (bone, &(a, b)) in self.bones.iter_mut().zip(BONES.iter()) {
            bone.start = self.markers[a];
            bone.end = self.markers[b];
            bone.dirty = true;
        }
    }
}

#[derive(Clone, Debug)]
pub struct Scene {
    hands: [HandVisual; MAX_HANDS],
}

impl Scene {
    pub fn new() -> Self {
        Self {
            hands: [
                HandVisual::new(HAND_COLOR_PRIMARY),
                HandVisual::new(HAND_COLOR_SECONDARY),
            ],
        }
    }

    pub fn hand(&self, slot: usize) -> Option<&HandVisual> {
        self.hands.get(slot)
    }

    pub fn hands(&self) -> &[HandVisual] {
        &self.hands
    }

    pub fn hide_all(&mut self) {
        for hand in &mut self.hands {
            hand.visible = false;
        }
    }

    /// Writes one detection into a slot and shows it. Returns `false` and
    /// leaves the slot untouched when the slot or frame size is unusable.
    pub fn update_hand(
        &mut self,
        slot: usize,
        landmarks: &Landmarks,
        frame_width: u32,
        frame_height: u32,
    ) -> bool {
        if frame_width == 0 || frame_height == 0 {
            return false;
        }
        let Some(hand) = self.hands.get_mut(slot) else {
            return false;
        };
        hand.apply(landmarks, frame_width, frame_height);
        hand.visible = true;
        true
    }

    pub fn visible_count(&self) -> usize {
        self.hands.iter().filter(|h| h.visible).count()
    }

    /// Clears the dirty flags once the geometry has been drawn.
    fn mark_uploaded(&mut self) {
        for bone in self.hands.iter_mut().flat_map(|h| h.bones.iter_mut()) {
            bone.dirty = false;
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

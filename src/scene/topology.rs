/// Bone segments as pairs of landmark indices: four per finger from the wrist
/// outwards (thumb, index, middle, ring, pinky), then the palm cross-links.
pub const BONES: [(usize, usize); NUM_BONES] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

pub const NUM_BONES: usize = 23;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_LANDMARKS;

    #[test]
    fn bones_reference_valid_landmarks() {
        for (a, b) in BONES {
            assert!(a < NUM_LANDMARKS && b < NUM_LANDMARKS);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn every_finger_has_four_bones() {
        for finger in 0..5 {
            let base = 1 + finger * 4;
            let chain = &BONES[finger * 4..finger * 4 + 4];
            assert_eq!(chain[0], (0, base));
            assert_eq!(chain[3], (base + 2, base + 3));
        }
    }
}

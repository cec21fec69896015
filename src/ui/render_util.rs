use super::{Arc, ImageBuffer, ImageFrame, RenderImage, Rgba};
use crate::types::Frame;

/// Camera frame as it appears in the preview: mirrored like a selfie view.
pub(super) fn frame_to_image(frame: &Frame) -> Option<Arc<RenderImage>> {
    if !frame.has_pixels() {
        return None;
    }
    let bgra = to_bgra(&frame.rgba, frame.width, true);
    bgra_to_image(frame.width, frame.height, bgra)
}

pub(super) fn rgba_to_image(image: &image::RgbaImage) -> Option<Arc<RenderImage>> {
    let (width, height) = image.dimensions();
    let bgra = to_bgra(image.as_raw(), width, false);
    bgra_to_image(width, height, bgra)
}

fn bgra_to_image(width: u32, height: u32, bgra: Vec<u8>) -> Option<Arc<RenderImage>> {
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, bgra)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

// GPUI expects BGRA; converting here avoids the async asset pipeline and flicker.
fn to_bgra(rgba: &[u8], width: u32, mirror: bool) -> Vec<u8> {
    let row_len = width as usize * 4;
    let mut out = Vec::with_capacity(rgba.len());
    if row_len == 0 {
        return out;
    }

    for row in rgba.chunks_exact(row_len) {
        let mut push = |px: &[u8]| out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        if mirror {
            row.chunks_exact(4).rev().for_each(&mut push);
        } else {
            row.chunks_exact(4).for_each(&mut push);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_swapped() {
        let rgba = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(to_bgra(&rgba, 2, false), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn mirroring_reverses_each_row() {
        let rgba = [
            1, 0, 0, 255, 2, 0, 0, 255, //
            3, 0, 0, 255, 4, 0, 0, 255,
        ];
        let bgra = to_bgra(&rgba, 2, true);
        let reds: Vec<u8> = bgra.chunks_exact(4).map(|px| px[2]).collect();
        assert_eq!(reds, vec![2, 1, 4, 3]);
    }

    #[test]
    fn zero_width_yields_nothing() {
        assert!(to_bgra(&[], 0, true).is_empty());
    }
}

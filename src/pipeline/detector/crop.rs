use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Landmarks, NUM_LANDMARKS};

/// Side of the square crop fed to the handpose estimator.
pub const HANDPOSE_INPUT_SIZE: u32 = 224;
/// Side of the letterboxed frame fed to the palm detector.
pub const PALM_INPUT_SIZE: u32 = 192;

#[derive(Clone, Debug, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Maps handpose crop coordinates back into the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl CropTransform {
    fn scale(&self) -> f32 {
        self.side / self.output_size as f32
    }

    /// Projects one crop-space landmark to frame pixels. Depth is scaled
    /// by the same factor as x and y so it stays in pixel-like units.
    pub fn project(&self, point: [f32; 3]) -> [f32; 3] {
        let [x, y, z] = point;
        let half = self.output_size as f32 / 2.0;
        let scale = self.scale();
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.angle.sin_cos();
        let ox = self.center.0 + dx * cos - dy * sin;
        let oy = self.center.1 + dx * sin + dy * cos;
        [
            ox.clamp(0.0, (self.orig_w.saturating_sub(1)) as f32),
            oy.clamp(0.0, (self.orig_h.saturating_sub(1)) as f32),
            z * scale,
        ]
    }
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }
    Ok(())
}

/// Resizes the frame into a black `target_size` square, keeping its aspect
/// ratio, and normalises it to an NHWC tensor in `[0, 1]`.
pub fn letterbox(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    check_frame(frame)?;

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size - new_w.min(target_size)) / 2) as usize;
    let pad_y = ((target_size - new_h.min(target_size)) / 2) as usize;
    let side = target_size as usize;
    let mut data = vec![0.0f32; side * side * 3];
    let src_stride = new_w as usize * 4;

    data.par_chunks_mut(side * 3)
        .enumerate()
        .skip(pad_y)
        .take(new_h as usize)
        .for_each(|(row, dst)| {
            let src_row = &resized[(row - pad_y) * src_stride..(row - pad_y + 1) * src_stride];
            for (col, px) in src_row.chunks_exact(4).enumerate() {
                let offset = (pad_x + col) * 3;
                if offset + 2 >= dst.len() {
                    break;
                }
                dst[offset] = px[0] as f32 / 255.0;
                dst[offset + 1] = px[1] as f32 / 255.0;
                dst[offset + 2] = px[2] as f32 / 255.0;
            }
        });

    let input = Array4::<f32>::from_shape_vec((1, side, side, 3), data)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok((
        input,
        LetterboxInfo {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// Samples a rotated square around `center` into an NHWC tensor.
pub fn rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    check_frame(frame)?;

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };
    let half = output_size as f32 / 2.0;
    let scale = transform.scale();
    let (sin, cos) = angle.sin_cos();
    let n = output_size as usize;

    let mut data = vec![0.0f32; n * n * 3];
    data.par_chunks_mut(n * 3).enumerate().for_each(|(y, row)| {
        let dy = (y as f32 + 0.5 - half) * scale;
        for x in 0..n {
            let dx = (x as f32 + 0.5 - half) * scale;
            let src_x = center.0 + dx * cos - dy * sin;
            let src_y = center.1 + dx * sin + dy * cos;
            row[x * 3..x * 3 + 3].copy_from_slice(&sample_rgb(frame, src_x, src_y));
        }
    });

    let array = Array4::<f32>::from_shape_vec((1, n, n, 3), data)
        .map_err(|err| anyhow!("failed to build rotated crop tensor: {err}"))?;

    Ok((array, transform))
}

/// Reads the estimator's flat `[x, y, z] * 21` output and maps it to frame
/// pixels.
pub fn decode_landmarks(flat: &[f32], transform: &CropTransform) -> Result<Landmarks> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    let mut landmarks = [[0.0f32; 3]; NUM_LANDMARKS];
    for (dst, chunk) in landmarks.iter_mut().zip(flat.chunks_exact(3)) {
        *dst = transform.project([chunk[0], chunk[1], chunk[2]]);
    }
    Ok(landmarks)
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if x.is_nan() || y.is_nan() {
        return [0.0; 3];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let (w, h) = (frame.width as i32, frame.height as i32);

    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        let (ix, iy) = (cx as i32, cy as i32);
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0; 3];
        }
        let idx = ((iy as u32 * frame.width + ix as u32) as usize) * 4;
        match frame.rgba.get(idx..idx + 3) {
            Some(px) => [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ],
            None => [0.0; 3],
        }
    };

    let (fx, fy) = (x - x0, y - y0);
    let c00 = fetch(x0, y0);
    let c10 = fetch(x0 + 1.0, y0);
    let c01 = fetch(x0, y0 + 1.0);
    let c11 = fetch(x0 + 1.0, y0 + 1.0);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy))
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let rgba = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn letterbox_pads_the_short_side() {
        let frame = solid_frame(64, 32, [255, 255, 255]);
        let (input, info) = letterbox(&frame, 32).unwrap();
        assert_eq!(input.shape(), &[1, 32, 32, 3]);
        assert_eq!(info.pad_x, 0.0);
        assert_eq!(info.pad_y, 8.0);
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert!((input[[0, 16, 16, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let mut frame = solid_frame(4, 4, [0, 0, 0]);
        frame.rgba.pop();
        assert!(letterbox(&frame, 16).is_err());
        assert!(rotated_crop(&frame, (2.0, 2.0), 4.0, 0.0, 8).is_err());
    }

    #[test]
    fn unrotated_crop_projects_centre_to_centre() {
        let transform = CropTransform {
            center: (320.0, 240.0),
            side: 448.0,
            angle: 0.0,
            output_size: HANDPOSE_INPUT_SIZE,
            orig_w: 640,
            orig_h: 480,
        };
        let [x, y, z] = transform.project([112.0, 112.0, 10.0]);
        assert!((x - 320.0).abs() < 1e-4);
        assert!((y - 240.0).abs() < 1e-4);
        assert!((z - 20.0).abs() < 1e-4);
    }

    #[test]
    fn decode_needs_all_landmarks() {
        let transform = CropTransform {
            center: (0.0, 0.0),
            side: 224.0,
            angle: 0.0,
            output_size: HANDPOSE_INPUT_SIZE,
            orig_w: 640,
            orig_h: 480,
        };
        assert!(decode_landmarks(&[0.0; 60], &transform).is_err());
        let landmarks = decode_landmarks(&[112.0; 63], &transform).unwrap();
        assert_eq!(landmarks.len(), NUM_LANDMARKS);
    }

    #[test]
    fn crop_samples_frame_colour() {
        let frame = solid_frame(32, 32, [255, 0, 0]);
        let (input, _) = rotated_crop(&frame, (16.0, 16.0), 8.0, 0.3, 8).unwrap();
        assert!((input[[0, 4, 4, 0]] - 1.0).abs() < 1e-5);
        assert!(input[[0, 4, 4, 1]].abs() < 1e-5);
    }
}

use anyhow::{Result, anyhow, bail};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

#[derive(Debug)]
pub struct RgbaFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes whatever the driver delivered into tightly packed RGBA8.
pub fn convert_camera_frame(frame: &Buffer) -> Result<RgbaFrame> {
    let resolution = frame.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = frame.buffer();
    let pixels = width as usize * height as usize;

    let rgba = match frame.source_frame_format() {
        FrameFormat::MJPEG => {
            let (rgba, w, h) = decode_mjpeg(data)?;
            return Ok(RgbaFrame {
                rgba,
                width: w,
                height: h,
            });
        }
        FrameFormat::NV12 => {
            require_len("NV12", data, pixels + pixels / 2)?;
            let mut rgba = vec![0u8; pixels * 4];
            let (y_plane, uv_plane) = data.split_at(pixels);
            let image = YuvBiPlanarImage {
                y_plane,
                y_stride: width,
                uv_plane: &uv_plane[..pixels / 2],
                uv_stride: width,
                width,
                height,
            };
            yuv_nv12_to_rgba(
                &image,
                &mut rgba,
                width * 4,
                YuvRange::Full,
                YuvStandardMatrix::Bt709,
                YuvConversionMode::Balanced,
            )
            .map_err(|err| anyhow!("NV12→RGBA failed: {err:?}"))?;
            rgba
        }
        FrameFormat::YUYV => {
            require_len("YUYV", data, pixels * 2)?;
            let mut rgba = vec![0u8; pixels * 4];
            let packed = YuvPackedImage {
                yuy: data,
                yuy_stride: width * 2,
                width,
                height,
            };
            yuyv422_to_rgba(
                &packed,
                &mut rgba,
                width * 4,
                YuvRange::Full,
                YuvStandardMatrix::Bt709,
            )
            .map_err(|err| anyhow!("YUYV422→RGBA failed: {err:?}"))?;
            rgba
        }
        FrameFormat::RAWRGB => {
            expand_pixels("RGB", data, pixels, 3, |src| [src[0], src[1], src[2]])?
        }
        FrameFormat::RAWBGR => {
            expand_pixels("BGR", data, pixels, 3, |src| [src[2], src[1], src[0]])?
        }
        FrameFormat::GRAY => {
            expand_pixels("GRAY", data, pixels, 1, |src| [src[0], src[0], src[0]])?
        }
    };

    Ok(RgbaFrame {
        rgba,
        width,
        height,
    })
}

fn require_len(format: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        bail!(
            "{format} buffer too small: got {}, expected {expected}",
            data.len()
        );
    }
    Ok(())
}

fn expand_pixels<F>(
    format: &str,
    data: &[u8],
    pixels: usize,
    bytes_per_pixel: usize,
    to_rgb: F,
) -> Result<Vec<u8>>
where
    F: Fn(&[u8]) -> [u8; 3] + Sync,
{
    require_len(format, data, pixels * bytes_per_pixel)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(bytes_per_pixel))
        .for_each(|(dst, src)| {
            let [r, g, b] = to_rgb(src);
            dst.copy_from_slice(&[r, g, b, 255]);
        });
    Ok(rgba)
}

/// MJPEG frames carry their own dimensions, which win over the negotiated ones.
fn decode_mjpeg(data: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder returned no image info"))?;

    let (width, height) = (u32::from(info.width), u32::from(info.height));
    require_len("MJPEG", &rgba, width as usize * height as usize * 4)?;
    Ok((rgba, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_is_swapped_into_rgba() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let rgba = expand_pixels("BGR", &data, 2, 3, |src| [src[2], src[1], src[0]]).unwrap();
        assert_eq!(rgba, vec![3, 2, 1, 255, 6, 5, 4, 255]);
    }

    #[test]
    fn gray_is_replicated_into_each_channel() {
        let rgba = expand_pixels("GRAY", &[7, 9], 2, 1, |src| [src[0], src[0], src[0]]).unwrap();
        assert_eq!(rgba, vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let err = expand_pixels("RGB", &[1, 2], 1, 3, |src| [src[0], src[1], src[2]]).unwrap_err();
        assert!(err.to_string().contains("RGB buffer too small"));
    }
}

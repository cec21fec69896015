use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use image::{ImageFormat, Rgba, RgbaImage, imageops};

use crate::{error::ExportError, scene::text::draw_text_centered, types::Frame};

pub const LIVE_FEED_FILENAME: &str = "hologen1_live_feed.png";
pub const MIRROR_FILENAME: &str = "hologen1_3d_mirror.png";

/// Pause between the two file writes.
pub const EXPORT_STAGGER: Duration = Duration::from_millis(200);

const PLACEHOLDER_WIDTH: u32 = 640;
const PLACEHOLDER_HEIGHT: u32 = 480;
const PLACEHOLDER_BACKGROUND: Rgba<u8> = Rgba([0x1a, 0x1a, 0x3a, 0xff]);
const PLACEHOLDER_TEXT: Rgba<u8> = Rgba([0xe0, 0xe0, 0xe0, 0xff]);
const PLACEHOLDER_TEXT_SCALE: u32 = 3;

/// The two images written by one capture.
#[derive(Clone, Debug)]
pub struct Snapshots {
    pub live_feed: RgbaImage,
    pub mirror: RgbaImage,
}

/// Horizontally mirrored copy of the current camera frame, matching what the
/// preview shows.
pub fn capture_live_feed(frame: Option<&Frame>) -> RgbaImage {
    let Some(frame) = frame.filter(|f| f.has_pixels()) else {
        return placeholder(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, "Live Feed Not Available");
    };

    match RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()) {
        Some(image) => imageops::flip_horizontal(&image),
        None => {
            log::warn!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.rgba.len(),
                frame.width,
                frame.height
            );
            placeholder(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, "Live Feed Not Available")
        }
    }
}

pub fn capture_scene(image: Option<&RgbaImage>, width: u32, height: u32) -> RgbaImage {
    match image.filter(|img| img.width() > 0 && img.height() > 0) {
        Some(image) => image.clone(),
        None => {
            let (width, height) = if width == 0 || height == 0 {
                (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
            } else {
                (width, height)
            };
            placeholder(width, height, "3D Mirror Not Available")
        }
    }
}

fn placeholder(width: u32, height: u32, text: &str) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, PLACEHOLDER_BACKGROUND);
    let scale = PLACEHOLDER_TEXT_SCALE.min((width / (8 * text.len().max(1) as u32)).max(1));
    draw_text_centered(
        &mut image,
        text,
        width / 2,
        height / 2,
        scale,
        PLACEHOLDER_TEXT,
    );
    image
}

/// Writes the live feed, waits [`EXPORT_STAGGER`], then writes the mirror.
pub fn save_snapshots(dir: &Path, snapshots: &Snapshots) -> Result<Vec<PathBuf>, ExportError> {
    save_snapshots_with_stagger(dir, snapshots, EXPORT_STAGGER)
}

fn save_snapshots_with_stagger(
    dir: &Path,
    snapshots: &Snapshots,
    stagger: Duration,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;

    let live_path = write_png(dir, LIVE_FEED_FILENAME, &snapshots.live_feed)?;
    thread::sleep(stagger);
    let mirror_path = write_png(dir, MIRROR_FILENAME, &snapshots.mirror)?;

    Ok(vec![live_path, mirror_path])
}

fn write_png(
    dir: &Path,
    filename: &'static str,
    image: &RgbaImage,
) -> Result<PathBuf, ExportError> {
    let path = dir.join(filename);
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|source| ExportError::Encode { filename, source })?;
    log::info!("saved {}", path.display());
    Ok(path)
}

/// Runs [`save_snapshots`] off the UI thread.
pub fn spawn_save(
    dir: PathBuf,
    snapshots: Snapshots,
) -> thread::JoinHandle<Result<Vec<PathBuf>, ExportError>> {
    thread::spawn(move || {
        let result = save_snapshots(&dir, &snapshots);
        if let Err(err) = &result {
            log::error!("capture failed: {err}");
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn frame(width: u32, height: u32) -> Frame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("hologen-export-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn live_feed_is_mirrored() {
        let image = capture_live_feed(Some(&frame(4, 2)));
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(0, 0).0, [3, 0, 0, 255]);
        assert_eq!(image.get_pixel(3, 1).0, [0, 1, 0, 255]);
    }

    #[test]
    fn zero_dimension_video_gives_placeholder() {
        let empty = Frame {
            rgba: Vec::new(),
            width: 0,
            height: 0,
            timestamp: Instant::now(),
        };
        let image = capture_live_feed(Some(&empty));
        assert_eq!(image.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
        assert_eq!(*image.get_pixel(0, 0), PLACEHOLDER_BACKGROUND);
        assert!(image.pixels().any(|p| *p == PLACEHOLDER_TEXT));

        let missing = capture_live_feed(None);
        assert_eq!(missing.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
    }

    #[test]
    fn missing_scene_uses_requested_size() {
        let image = capture_scene(None, 320, 240);
        assert_eq!(image.dimensions(), (320, 240));
        assert_eq!(*image.get_pixel(0, 0), PLACEHOLDER_BACKGROUND);

        let fallback = capture_scene(None, 0, 0);
        assert_eq!(fallback.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
    }

    #[test]
    fn rendered_scene_is_passed_through() {
        let rendered = RgbaImage::from_pixel(5, 5, Rgba([1, 2, 3, 255]));
        assert_eq!(capture_scene(Some(&rendered), 640, 480), rendered);
    }

    #[test]
    fn both_files_are_written_in_order() {
        let dir = scratch_dir("order");
        let snapshots = Snapshots {
            live_feed: capture_live_feed(Some(&frame(4, 4))),
            mirror: capture_scene(None, 16, 12),
        };

        let paths =
            save_snapshots_with_stagger(&dir, &snapshots, Duration::from_millis(20)).unwrap();
        assert_eq!(paths, vec![dir.join(LIVE_FEED_FILENAME), dir.join(MIRROR_FILENAME)]);

        let live = fs::metadata(&paths[0]).unwrap().modified().unwrap();
        let mirror = fs::metadata(&paths[1]).unwrap().modified().unwrap();
        assert!(mirror >= live);
        assert_eq!(image::open(&paths[1]).unwrap().to_rgba8().dimensions(), (16, 12));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let dir = scratch_dir("blocked");
        fs::create_dir_all(dir.parent().unwrap()).unwrap();
        fs::write(&dir, b"not a directory").unwrap();

        let snapshots = Snapshots {
            live_feed: capture_live_feed(None),
            mirror: capture_scene(None, 8, 8),
        };
        let err = save_snapshots_with_stagger(&dir, &snapshots, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));

        let _ = fs::remove_file(&dir);
    }
}

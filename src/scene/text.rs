use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};

const GLYPH_SIZE: u32 = 8;

/// Draws `text` centred on `(cx, cy)` using the 8x8 bitmap font scaled by
/// `scale`. Characters outside basic Latin are skipped.
pub fn draw_text_centered(
    image: &mut RgbaImage,
    text: &str,
    cx: u32,
    cy: u32,
    scale: u32,
    color: Rgba<u8>,
) {
    let scale = scale.max(1);
    let advance = GLYPH_SIZE * scale;
    let text_width = text.chars().count() as u32 * advance;
    let left = cx as i64 - text_width as i64 / 2;
    let top = cy as i64 - advance as i64 / 2;

    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let origin_x = left + i as i64 * advance as i64;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                fill_block(
                    image,
                    origin_x + (col * scale) as i64,
                    top + (row as u32 * scale) as i64,
                    scale,
                    color,
                );
            }
        }
    }
}

fn fill_block(image: &mut RgbaImage, x: i64, y: i64, size: u32, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    for dy in 0..size as i64 {
        for dx in 0..size as i64 {
            let (px, py) = (x + dx, y + dy);
            if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                continue;
            }
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

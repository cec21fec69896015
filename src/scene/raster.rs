use glam::{Mat4, Vec3, Vec4Swizzles};
use image::RgbaImage;

use super::Scene;

const FOV_Y_DEGREES: f32 = 60.0;
const NEAR: f32 = 0.01;
const FAR: f32 = 20.0;
const EYE: Vec3 = Vec3::new(0.0, 0.2, 0.7);
const TARGET: Vec3 = Vec3::new(0.0, 0.1, 0.0);

const POINT_SIZE: f32 = 0.01;
const LINE_THICKNESS: i32 = 2;
const BONE_OPACITY: f32 = 0.9;
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// Software renderer for the hand scene: a perspective camera, shaded
/// discs for the markers and thick lines for the bones.
#[derive(Clone, Debug)]
pub struct Renderer {
    width: u32,
    height: u32,
    view_proj: Mat4,
}

struct ProjectedMarker {
    x: f32,
    y: f32,
    depth: f32,
    radius: f32,
    color: [u8; 3],
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut renderer = Self {
            width: 1,
            height: 1,
            view_proj: Mat4::IDENTITY,
        };
        renderer.resize(width, height);
        renderer
    }

    /// Resizes the target. A collapsed height falls back to a 4:3 box.
    pub fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        let width = width.max(1);
        let height = if height <= 10 {
            (width * 3 / 4).max(1)
        } else {
            height
        };

        self.width = width;
        self.height = height;
        let aspect = width as f32 / height as f32;
        let projection = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, NEAR, FAR);
        let view = Mat4::look_at_rh(EYE, TARGET, Vec3::Y);
        self.view_proj = projection * view;

        log::debug!("3D mirror resized to {width}x{height}");
        (width, height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns screen x, y and clip depth, or `None` behind the camera.
    fn project(&self, point: Vec3) -> Option<(f32, f32, f32)> {
        let clip = self.view_proj * point.extend(1.0);
        if clip.w <= NEAR {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * self.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * self.height as f32;
        Some((x, y, ndc.z))
    }

    fn focal_px(&self) -> f32 {
        (self.height as f32 * 0.5) / (FOV_Y_DEGREES.to_radians() * 0.5).tan()
    }

    /// Draws the visible hands and marks their geometry as uploaded.
    pub fn render(&self, scene: &mut Scene) -> RgbaImage {
        let (width, height) = (self.width, self.height);
        let mut buffer: Vec<u8> = BACKGROUND
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();

        let mut markers = Vec::new();
        for hand in scene.hands().iter().filter(|h| h.visible) {
            for bone in &hand.bones {
                if let (Some(a), Some(b)) = (self.project(bone.start), self.project(bone.end)) {
                    draw_line(
                        &mut buffer,
                        width,
                        height,
                        (a.0, a.1),
                        (b.0, b.1),
                        hand.color,
                        BONE_OPACITY,
                    );
                }
            }

            for marker in &hand.markers {
                let Some((x, y, depth)) = self.project(*marker) else {
                    continue;
                };
                let distance = (*marker - EYE).length().max(NEAR);
                markers.push(ProjectedMarker {
                    x,
                    y,
                    depth,
                    radius: (POINT_SIZE / distance * self.focal_px()).max(1.5),
                    color: hand.color,
                });
            }
        }

        // Far markers first so near ones cover them.
        markers.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        for marker in &markers {
            draw_shaded_disc(&mut buffer, width, height, marker);
        }

        scene.mark_uploaded();

        RgbaImage::from_raw(width, height, buffer)
            .unwrap_or_else(|| RgbaImage::from_pixel(width, height, image::Rgba(BACKGROUND)))
    }
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: (f32, f32),
    p1: (f32, f32),
    color: [u8; 3],
    opacity: f32,
) {
    let (mut x0, mut y0) = (p0.0.round() as i32, p0.1.round() as i32);
    let (x1, y1) = (p1.0.round() as i32, p1.1.round() as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (LINE_THICKNESS.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    blend_pixel(buffer, width, height, x0 + ox, y0 + oy, color, opacity);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_shaded_disc(buffer: &mut [u8], width: u32, height: u32, marker: &ProjectedMarker) {
    let light = Vec3::new(1.0, 1.0, 1.0).normalize();
    let r = marker.radius;
    let reach = r.ceil() as i32;
    let (cx, cy) = (marker.x, marker.y);

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let nx = dx as f32 / r;
            // Screen y grows downwards, the light comes from above.
            let ny = -(dy as f32) / r;
            let d2 = nx * nx + ny * ny;
            if d2 > 1.0 {
                continue;
            }
            let normal = Vec3::new(nx, ny, (1.0 - d2).sqrt());
            let diffuse = normal.dot(light).max(0.0);
            let shade = (0.7 + 0.3 * diffuse).min(1.0);
            let color = marker.color.map(|c| (c as f32 * shade) as u8);
            blend_pixel(
                buffer,
                width,
                height,
                cx.round() as i32 + dx,
                cy.round() as i32 + dy,
                color,
                1.0,
            );
        }
    }
}

fn blend_pixel(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    color: [u8; 3],
    alpha: f32,
) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 >= buffer.len() {
        return;
    }
    for (channel, value) in color.iter().enumerate() {
        let dst = buffer[idx + channel] as f32;
        buffer[idx + channel] = (dst + (*value as f32 - dst) * alpha).round() as u8;
    }
    buffer[idx + 3] = 255;
}

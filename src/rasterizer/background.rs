//! Background pass: fills every pixel no primitive touched
//!
//! Runs once after the backend has finished, so both backends share it.
//! A pixel counts as untouched while its depth is still [`DEPTH_CLEAR`].

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::framebuffer::Framebuffer;
use super::math::{Mat3, Mat4, Vec3};
use super::types::{Color, Texture};
use super::DEPTH_CLEAR;

/// Cube face order: +X, -X, +Y, -Y, +Z, -Z
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeFace {
    Right = 0,
    Left = 1,
    Top = 2,
    Bottom = 3,
    Front = 4,
    Back = 5,
}

impl CubeFace {
    /// Face hit by a direction, by its largest axis. Ties favor x, then y.
    pub fn from_direction(d: Vec3) -> CubeFace {
        let (ax, ay, az) = (d.x.abs(), d.y.abs(), d.z.abs());
        if ax >= ay && ax >= az {
            if d.x > 0.0 {
                CubeFace::Right
            } else {
                CubeFace::Left
            }
        } else if ay >= az {
            if d.y > 0.0 {
                CubeFace::Top
            } else {
                CubeFace::Bottom
            }
        } else if d.z > 0.0 {
            CubeFace::Front
        } else {
            CubeFace::Back
        }
    }

    /// Face-local UV of a direction, clamped to [0, 1]
    pub fn uv(self, d: Vec3) -> (f32, f32) {
        let (major, s, t) = match self {
            CubeFace::Right => (d.x, -d.z, -d.y),
            CubeFace::Left => (-d.x, d.z, -d.y),
            CubeFace::Top => (d.y, d.x, d.z),
            CubeFace::Bottom => (-d.y, d.x, -d.z),
            CubeFace::Front => (d.z, d.x, -d.y),
            CubeFace::Back => (-d.z, -d.x, -d.y),
        };
        let u = (s / major + 1.0) * 0.5;
        let v = (t / major + 1.0) * 0.5;
        (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
    }
}

/// Six face textures, indexed by [`CubeFace`]
#[derive(Debug, Clone)]
pub struct Cubemap {
    faces: [Texture; 6],
}

impl Cubemap {
    pub fn new(faces: [Texture; 6]) -> Self {
        Self { faces }
    }

    /// One flat color per face, mostly for tests and placeholders
    pub fn from_colors(colors: [u32; 6]) -> Self {
        Self::new(colors.map(|c| Texture::from_pixels(1, 1, vec![c], "cube face")))
    }

    pub fn face(&self, face: CubeFace) -> &Texture {
        &self.faces[face as usize]
    }

    /// Nearest sample along a world-space direction. Zero or non-finite
    /// directions sample black.
    pub fn sample(&self, dir: Vec3) -> u32 {
        let len = dir.len();
        if !len.is_finite() || len < 1e-4 {
            return Color::BLACK.to_argb();
        }
        let d = dir.scale(1.0 / len);
        let face = CubeFace::from_direction(d);
        let (u, v) = face.uv(d);
        self.face(face).sample(u, v)
    }
}

/// Fixed-seed star field over a dark clear color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarField {
    pub seed: u64,
    pub count: usize,
    /// Packed ARGB of empty space
    pub space: u32,
}

impl Default for StarField {
    fn default() -> Self {
        Self {
            seed: 42,
            count: 300,
            space: 0xFF000008,
        }
    }
}

impl StarField {
    /// Render the field for a `width` x `height` buffer.
    ///
    /// Stars are white, blue-white or yellow-white at brightness 100..255.
    /// The same seed and size always give the same image.
    pub fn generate(&self, width: usize, height: usize) -> Vec<u32> {
        let mut pixels = vec![self.space; width * height];
        if pixels.is_empty() {
            return pixels;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.count {
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);
            let b: u8 = rng.gen_range(100..255);
            let star = match rng.gen_range(0..3) {
                0 => Color::new(b, b, b),
                1 => Color::new(scale(b, 3, 4), scale(b, 3, 4), b),
                _ => Color::new(b, scale(b, 9, 10), scale(b, 3, 4)),
            };
            pixels[y * width + x] = star.to_argb();
        }
        pixels
    }
}

fn scale(channel: u8, num: u16, den: u16) -> u8 {
    (channel as u16 * num / den) as u8
}

/// What fills the pixels no primitive covered
#[derive(Debug, Clone)]
pub enum Background {
    Solid(u32),
    StarField(StarField),
    /// Cubemap sampled along each pixel's view ray
    Skybox(Arc<Cubemap>),
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid(Color::BLACK.to_argb())
    }
}

/// Per-pixel world-space view rays for one camera
#[derive(Debug, Clone, Copy)]
pub struct SkyRays {
    view_to_world: Mat3,
    x_scale: f32,
    y_scale: f32,
    width: f32,
    height: f32,
}

impl SkyRays {
    pub fn new(view: &Mat4, projection: &Mat4, width: usize, height: usize) -> Self {
        let rotation = view.upper3();
        let view_to_world = if rotation.determinant().abs() > 1e-12 {
            rotation.inverse()
        } else {
            Mat3::IDENTITY
        };
        Self {
            view_to_world,
            x_scale: projection.m[0][0],
            y_scale: projection.m[1][1],
            width: width as f32,
            height: height as f32,
        }
    }

    /// Unnormalized world direction through the corner of pixel (x, y)
    pub fn direction(&self, x: usize, y: usize) -> Vec3 {
        let ndc_x = 2.0 * x as f32 / self.width - 1.0;
        let ndc_y = 1.0 - 2.0 * y as f32 / self.height;
        let view = Vec3::new(ndc_x / self.x_scale, ndc_y / self.y_scale, 1.0);
        self.view_to_world.transform_vec3(view)
    }
}

/// Write `shade(x, y)` into every untouched pixel, one row per task.
/// Depth is left at the sentinel. Returns the number of pixels filled.
pub fn fill_background<F>(fb: &mut Framebuffer, shade: F) -> usize
where
    F: Fn(usize, usize) -> u32 + Sync,
{
    let width = fb.width;
    if width == 0 {
        return 0;
    }
    let Framebuffer { pixels, zbuffer, .. } = fb;
    pixels
        .par_chunks_mut(width)
        .zip(zbuffer.par_chunks(width))
        .enumerate()
        .map(|(y, (row, depth))| {
            let mut filled = 0;
            for (x, (pixel, &z)) in row.iter_mut().zip(depth).enumerate() {
                if z >= DEPTH_CLEAR {
                    *pixel = shade(x, y);
                    filled += 1;
                }
            }
            filled
        })
        .sum()
}

/// A [`Background`] plus the star image cached for the current size
#[derive(Debug, Clone, Default)]
pub struct BackgroundPass {
    background: Background,
    stars: Vec<u32>,
    stars_size: (usize, usize),
}

impl BackgroundPass {
    pub fn new(background: Background) -> Self {
        Self {
            background,
            stars: Vec::new(),
            stars_size: (0, 0),
        }
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn set(&mut self, background: Background) {
        self.background = background;
        self.stars.clear();
        self.stars_size = (0, 0);
    }

    /// Fill the untouched pixels of a finished frame
    pub fn run(&mut self, fb: &mut Framebuffer, view: &Mat4, projection: &Mat4) -> usize {
        let (width, height) = (fb.width, fb.height);
        match &self.background {
            Background::Solid(color) => {
                let color = *color;
                fill_background(fb, |_, _| color)
            }
            Background::StarField(field) => {
                if self.stars_size != (width, height) || self.stars.len() != width * height {
                    self.stars = field.generate(width, height);
                    self.stars_size = (width, height);
                }
                let stars = &self.stars;
                let space = field.space;
                fill_background(fb, |x, y| stars.get(y * width + x).copied().unwrap_or(space))
            }
            Background::Skybox(cubemap) => {
                let rays = SkyRays::new(view, projection, width, height);
                fill_background(fb, |x, y| cubemap.sample(rays.direction(x, y)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACES: [u32; 6] = [0xFFFF0000, 0xFF00FF00, 0xFF0000FF, 0xFFFFFF00, 0xFF00FFFF, 0xFFFF00FF];

    fn face_color(face: CubeFace) -> u32 {
        FACES[face as usize]
    }

    #[test]
    fn test_face_selection() {
        assert_eq!(CubeFace::from_direction(Vec3::new(2.0, 1.0, -1.0)), CubeFace::Right);
        assert_eq!(CubeFace::from_direction(Vec3::new(-2.0, 1.0, 1.0)), CubeFace::Left);
        assert_eq!(CubeFace::from_direction(Vec3::new(0.1, 3.0, 1.0)), CubeFace::Top);
        assert_eq!(CubeFace::from_direction(Vec3::new(0.1, -3.0, 1.0)), CubeFace::Bottom);
        assert_eq!(CubeFace::from_direction(Vec3::new(0.0, 0.0, 1.0)), CubeFace::Front);
        assert_eq!(CubeFace::from_direction(Vec3::new(0.5, 0.2, -1.0)), CubeFace::Back);
    }

    #[test]
    fn test_face_centers_map_to_middle_uv() {
        let dirs = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        for d in dirs {
            let face = CubeFace::from_direction(d);
            let (u, v) = face.uv(d);
            assert!((u - 0.5).abs() < 1e-6 && (v - 0.5).abs() < 1e-6, "{:?}", face);
        }
    }

    #[test]
    fn test_cubemap_sample_and_zero_direction() {
        let cube = Cubemap::from_colors(FACES);
        assert_eq!(cube.sample(Vec3::new(0.0, 0.0, 5.0)), face_color(CubeFace::Front));
        assert_eq!(cube.sample(Vec3::new(0.0, -5.0, 0.0)), face_color(CubeFace::Bottom));
        assert_eq!(cube.sample(Vec3::ZERO), Color::BLACK.to_argb());
        assert_eq!(cube.sample(Vec3::new(f32::NAN, 0.0, 1.0)), Color::BLACK.to_argb());
    }

    #[test]
    fn test_sky_rays_follow_view_rotation() {
        let proj = Mat4::projection(90.0, 1.0, 10.0, 0.1);
        let straight = SkyRays::new(&Mat4::IDENTITY, &proj, 64, 64);
        let d = straight.direction(32, 32);
        assert!(d.x.abs() < 1e-5 && d.y.abs() < 1e-5 && d.z > 0.0);

        // Looking down +x in world space
        let turned = SkyRays::new(&Mat4::rotation_y(90.0), &proj, 64, 64);
        let d = turned.direction(32, 32);
        assert_eq!(CubeFace::from_direction(d), CubeFace::Right);

        // Top row points up
        let up = straight.direction(32, 0);
        assert!(up.y > 0.0);
    }

    #[test]
    fn test_star_field_is_deterministic() {
        let field = StarField::default();
        let a = field.generate(40, 30);
        let b = field.generate(40, 30);
        assert_eq!(a, b);

        let stars = a.iter().filter(|&&p| p != field.space).count();
        assert!(stars > 0 && stars <= field.count);
        assert!(a.iter().all(|&p| p >> 24 == 0xFF));

        let other = StarField { seed: 7, ..field }.generate(40, 30);
        assert_ne!(a, other);
        assert!(field.generate(0, 10).is_empty());
    }

    #[test]
    fn test_fill_only_touches_sentinel_depth() {
        let mut fb = Framebuffer::new(8, 4);
        fb.clear(0);
        fb.set_pixel_with_depth(2, 1, 0.5, 0xFF123456);

        let filled = fill_background(&mut fb, |x, y| (y * 8 + x) as u32);
        assert_eq!(filled, 31);
        assert_eq!(fb.get_pixel(2, 1), Some(0xFF123456));
        assert_eq!(fb.get_pixel(3, 2), Some(19));
        assert_eq!(fb.get_depth(3, 2), Some(DEPTH_CLEAR));
    }

    #[test]
    fn test_pass_caches_stars_per_size() {
        let mut pass = BackgroundPass::new(Background::StarField(StarField::default()));
        let mut fb = Framebuffer::new(20, 10);
        fb.clear(0);
        pass.run(&mut fb, &Mat4::IDENTITY, &Mat4::IDENTITY);
        assert_eq!(fb.pixels, StarField::default().generate(20, 10));

        fb.resize(12, 6);
        pass.run(&mut fb, &Mat4::IDENTITY, &Mat4::IDENTITY);
        assert_eq!(fb.pixels, StarField::default().generate(12, 6));
    }

    #[test]
    fn test_skybox_pass_fills_from_view_ray() {
        let mut pass = BackgroundPass::new(Background::Skybox(Arc::new(Cubemap::from_colors(FACES))));
        let proj = Mat4::projection(90.0, 1.0, 10.0, 0.1);
        let mut fb = Framebuffer::new(16, 16);
        fb.clear(0);

        pass.run(&mut fb, &Mat4::IDENTITY, &proj);
        assert_eq!(fb.get_pixel(8, 8), Some(face_color(CubeFace::Front)));

        fb.clear(0);
        pass.run(&mut fb, &Mat4::rotation_y(90.0), &proj);
        assert_eq!(fb.get_pixel(8, 8), Some(face_color(CubeFace::Right)));
    }
}

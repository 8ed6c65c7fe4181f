//! Core types for the rasterizer

use std::sync::Arc;

use super::math::{Vec2, Vec4};

/// RGBA color (0-255 per channel)
///
/// Buffers store colors packed as `(a << 24) | (r << 16) | (g << 8) | b`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque gray with every channel at `intensity * 255`
    pub fn gray(intensity: f32) -> Self {
        let v = (intensity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(v, v, v)
    }

    /// Pack into the ARGB word used by the color buffer
    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }

    pub const fn from_argb(packed: u32) -> Self {
        Self {
            a: (packed >> 24) as u8,
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        }
    }

    /// Convert to [u8; 4] in RGBA order
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<u32> for Color {
    fn from(packed: u32) -> Self {
        Color::from_argb(packed)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.to_argb()
    }
}

/// A vertex with homogeneous position, packed color and texture coordinate
///
/// Each pipeline stage copies the vertex and rewrites `pos`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    pub pos: Vec4,
    /// Packed ARGB
    pub color: u32,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(pos: Vec4, color: u32, uv: Vec2) -> Self {
        Self { pos, color, uv }
    }

    /// Model-space point (w = 1) with a color and no texture coordinate
    pub fn from_pos(x: f32, y: f32, z: f32, color: u32) -> Self {
        Self {
            pos: Vec4::point(x, y, z),
            color,
            uv: Vec2::default(),
        }
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.uv = Vec2::new(u, v);
        self
    }
}

/// Texture of packed ARGB texels, owned by the caller
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
    pub name: String,
}

/// Shared handle to a caller-owned texture. Identity is the allocation.
pub type TextureHandle = Arc<Texture>;

impl Texture {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::WHITE.to_argb(); width * height],
            name: String::new(),
        }
    }

    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>, name: impl Into<String>) -> Self {
        debug_assert_eq!(pixels.len(), width * height, "texel count doesn't match dimensions");
        Self {
            width,
            height,
            pixels,
            name: name.into(),
        }
    }

    /// Pack an already decoded image into ARGB texels
    pub fn from_rgba_image(img: &image::RgbaImage, name: impl Into<String>) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| Color::with_alpha(p[0], p[1], p[2], p[3]).to_argb())
            .collect();

        Self {
            width: width as usize,
            height: height as usize,
            pixels,
            name: name.into(),
        }
    }

    /// Create a checkerboard test texture
    pub fn checkerboard(width: usize, height: usize, color1: Color, color2: Color) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let checker = ((x / 4) + (y / 4)) % 2 == 0;
                pixels.push(if checker { color1 } else { color2 }.to_argb());
            }
        }
        Self { width, height, pixels, name: "checkerboard".to_string() }
    }

    pub fn into_handle(self) -> TextureHandle {
        Arc::new(self)
    }

    /// Nearest-neighbor sample. UVs are clamped to [0, 1] first.
    pub fn sample(&self, u: f32, v: f32) -> u32 {
        sample_nearest(&self.pixels, self.width, self.height, u, v)
    }

    /// Get pixel at x,y coordinates
    pub fn get_pixel(&self, x: usize, y: usize) -> u32 {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x]
        } else {
            Color::BLACK.to_argb()
        }
    }
}

/// Nearest-neighbor lookup into a raw texel slice.
///
/// UVs are clamped to [0, 1] and mapped onto `0..=size-1`. An empty texture
/// samples as black.
pub fn sample_nearest(texels: &[u32], width: usize, height: usize, u: f32, v: f32) -> u32 {
    if width == 0 || height == 0 {
        return Color::BLACK.to_argb();
    }
    // NaN clamps to 0 through the `as` cast
    let u = u.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let x = (u * (width - 1) as f32) as usize;
    let y = (v * (height - 1) as f32) as usize;
    texels
        .get(y * width + x)
        .copied()
        .unwrap_or(Color::BLACK.to_argb())
}

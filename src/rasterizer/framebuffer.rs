//! Color + depth buffers shared by both backends

use super::render::{DepthTarget, PixelRect};
use super::types::Color;
use super::DEPTH_CLEAR;

/// Framebuffer for software rendering
///
/// Colors are packed ARGB words; depth is smaller-is-nearer with
/// [`DEPTH_CLEAR`] meaning nothing has been drawn.
pub struct Framebuffer {
    pub pixels: Vec<u32>,
    pub zbuffer: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            zbuffer: vec![DEPTH_CLEAR; width * height],
            width,
            height,
        }
    }

    /// Reset every pixel to `color` and every depth to the sentinel
    pub fn clear(&mut self, color: u32) {
        self.pixels.fill(color);
        self.zbuffer.fill(DEPTH_CLEAR);
    }

    /// Reallocate for new dimensions. Contents are cleared.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width * height];
        self.zbuffer = vec![DEPTH_CLEAR; width * height];
    }

    /// Release both arrays
    pub fn release(&mut self) {
        self.pixels = Vec::new();
        self.zbuffer = Vec::new();
        self.width = 0;
        self.height = 0;
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn get_depth(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.zbuffer[y * self.width + x])
        } else {
            None
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Depth-tested write. Out-of-bounds coordinates are ignored.
    pub fn set_pixel_with_depth(&mut self, x: i32, y: i32, z: f32, color: u32) -> bool {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            let idx = y as usize * self.width + x as usize;
            if z < self.zbuffer[idx] {
                self.zbuffer[idx] = z;
                self.pixels[idx] = color;
                return true;
            }
        }
        false
    }

    /// Copy the color buffer out in the same packed layout
    pub fn read_back(&self, out: &mut [u32]) {
        let n = out.len().min(self.pixels.len());
        out[..n].copy_from_slice(&self.pixels[..n]);
    }

    /// Convert to an RGBA image for callers that hand frames to image tooling
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for &p in &self.pixels {
            bytes.extend_from_slice(&Color::from_argb(p).to_bytes());
        }
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, bytes)
            .unwrap_or_else(|| image::RgbaImage::new(self.width as u32, self.height as u32))
    }
}

impl DepthTarget for Framebuffer {
    #[inline]
    fn depth(&self, x: usize, y: usize) -> f32 {
        self.zbuffer[y * self.width + x]
    }

    #[inline]
    fn write(&mut self, x: usize, y: usize, z: f32, color: u32) {
        let idx = y * self.width + x;
        self.zbuffer[idx] = z;
        self.pixels[idx] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_cleared() {
        let fb = Framebuffer::new(4, 3);
        assert_eq!(fb.pixels.len(), 12);
        assert!(fb.zbuffer.iter().all(|&z| z == DEPTH_CLEAR));
    }

    #[test]
    fn test_depth_write_strictly_less() {
        let mut fb = Framebuffer::new(4, 4);
        assert!(fb.set_pixel_with_depth(1, 1, 0.5, 0xFF00FF00));
        // Equal depth is rejected: first writer wins
        assert!(!fb.set_pixel_with_depth(1, 1, 0.5, 0xFFFF0000));
        assert_eq!(fb.get_pixel(1, 1), Some(0xFF00FF00));
        assert!(fb.set_pixel_with_depth(1, 1, 0.25, 0xFFFF0000));
        assert_eq!(fb.get_pixel(1, 1), Some(0xFFFF0000));
        assert_eq!(fb.get_depth(1, 1), Some(0.25));
    }

    #[test]
    fn test_out_of_bounds_write_ignored() {
        let mut fb = Framebuffer::new(4, 4);
        assert!(!fb.set_pixel_with_depth(-1, 0, 0.1, 1));
        assert!(!fb.set_pixel_with_depth(4, 0, 0.1, 1));
        assert!(!fb.set_pixel_with_depth(0, 100, 0.1, 1));
        assert!(fb.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_clear_resets_depth() {
        let mut fb = Framebuffer::new(2, 2);
        fb.set_pixel_with_depth(0, 0, 0.1, 5);
        fb.clear(0xFF000000);
        assert_eq!(fb.get_pixel(0, 0), Some(0xFF000000));
        assert_eq!(fb.get_depth(0, 0), Some(DEPTH_CLEAR));
    }

    #[test]
    fn test_to_rgba_image_unpacks_channels() {
        let mut fb = Framebuffer::new(1, 1);
        fb.set_pixel(0, 0, 0x80102030);
        let img = fb.to_rgba_image();
        assert_eq!(img.get_pixel(0, 0).0, [0x10, 0x20, 0x30, 0x80]);
    }
}

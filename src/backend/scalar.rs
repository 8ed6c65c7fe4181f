//! Scalar backend: one pixel at a time, in submission order

use super::{FrameStats, RasterBackend};
use crate::error::BackendError;
use crate::rasterizer::{draw_line, rasterize_triangle, FragmentStage, Framebuffer, TexelSource, TextureHandle, Vertex};

#[derive(Debug, Default)]
pub struct ScalarBackend {
    stats: FrameStats,
}

impl ScalarBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RasterBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn begin_frame(&mut self, fb: &mut Framebuffer, clear_color: u32) {
        fb.clear(clear_color);
        self.stats = FrameStats::default();
    }

    fn submit_triangle(
        &mut self,
        fb: &mut Framebuffer,
        tri: &[Vertex; 3],
        texture: Option<&TextureHandle>,
        stage: &FragmentStage,
    ) {
        let bounds = fb.bounds();
        let texels = texture.map(|t| TexelSource::from(t.as_ref()));
        if texels.is_some() {
            self.stats.textured_triangles += 1;
        } else {
            self.stats.solid_triangles += 1;
        }
        self.stats.pixels_written += rasterize_triangle(fb, bounds, tri, texels.as_ref(), stage);
    }

    fn submit_line(&mut self, fb: &mut Framebuffer, start: &Vertex, end: &Vertex, color: u32, stage: &FragmentStage) {
        let bounds = fb.bounds();
        self.stats.lines += 1;
        self.stats.pixels_written += draw_line(fb, bounds, start, end, color, stage);
    }

    fn end_frame(&mut self, _fb: &mut Framebuffer) -> Result<FrameStats, BackendError> {
        Ok(std::mem::take(&mut self.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{Color, Texture, DEPTH_CLEAR};

    #[test]
    fn test_begin_frame_clears() {
        let mut fb = Framebuffer::new(8, 8);
        fb.set_pixel_with_depth(1, 1, 0.5, 7);
        let mut backend = ScalarBackend::new();
        backend.begin_frame(&mut fb, 0xFF101010);
        assert!(fb.pixels.iter().all(|&p| p == 0xFF101010));
        assert!(fb.zbuffer.iter().all(|&z| z == DEPTH_CLEAR));
    }

    #[test]
    fn test_textured_triangle_samples_texture() {
        let mut fb = Framebuffer::new(16, 16);
        let mut backend = ScalarBackend::new();
        backend.begin_frame(&mut fb, 0);

        let texture = Texture::from_pixels(1, 1, vec![0xFF336699], "flat").into_handle();
        let gray = Color::gray(1.0).to_argb();
        let tri = [
            Vertex::from_pos(0.0, 0.0, 0.5, gray),
            Vertex::from_pos(15.0, 0.0, 0.5, gray),
            Vertex::from_pos(0.0, 15.0, 0.5, gray),
        ];
        let stage = FragmentStage::default();
        backend.submit_triangle(&mut fb, &tri, Some(&texture), &stage);
        let stats = backend.end_frame(&mut fb).unwrap();

        assert_eq!(stats.textured_triangles, 1);
        assert!(stats.pixels_written > 0);
        assert_eq!(fb.get_pixel(1, 1), Some(0xFF336699));
    }
}

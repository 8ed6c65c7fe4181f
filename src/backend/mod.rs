//! Interchangeable execution backends
//!
//! Both consume screen-space primitives produced by the shared pipeline and
//! write the same framebuffer. The scalar backend rasterizes each submission
//! immediately; the compute backend batches them and dispatches tiles at the
//! end of the frame.

mod compute;
pub mod kernel;
mod scalar;

pub use compute::ComputeBackend;
pub use scalar::ScalarBackend;

use crate::error::BackendError;
use crate::rasterizer::{FragmentStage, Framebuffer, TextureHandle, Vertex};

/// Counters for one frame, for the caller's overlay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub solid_triangles: usize,
    pub textured_triangles: usize,
    pub lines: usize,
    /// Texture batches plus solid passes
    pub batches: usize,
    pub dispatches: usize,
    pub pixels_written: usize,
    /// Primitives entirely behind the near plane
    pub culled_by_clip: usize,
    /// Back-facing or degenerate after projection
    pub culled_backface: usize,
    /// Untouched pixels filled by the background pass
    pub background_pixels: usize,
}

/// A sink for screen-space primitives
pub trait RasterBackend: Send {
    fn name(&self) -> &'static str;

    /// Reset color to `clear_color` and depth to the sentinel
    fn begin_frame(&mut self, fb: &mut Framebuffer, clear_color: u32);

    /// `texture` is `Some` for textured triangles; their vertex color is the
    /// gray lighting word.
    fn submit_triangle(
        &mut self,
        fb: &mut Framebuffer,
        tri: &[Vertex; 3],
        texture: Option<&TextureHandle>,
        stage: &FragmentStage,
    );

    fn submit_line(&mut self, fb: &mut Framebuffer, start: &Vertex, end: &Vertex, color: u32, stage: &FragmentStage);

    /// Finish all pending work; the framebuffer holds the final image after this
    fn end_frame(&mut self, fb: &mut Framebuffer) -> Result<FrameStats, BackendError>;
}

//! PS1-style software rasterizer core
//!
//! Features:
//! - Affine texture mapping (no perspective correction = PS1 warping)
//! - Vertex snapping (integer coords = PS1 jitter)
//! - Flat per-triangle sun lighting
//! - Z-buffer, smaller depth wins

mod background;
mod clip;
mod framebuffer;
mod lighting;
mod math;
mod pipeline;
mod render;
mod types;

pub use background::*;
pub use clip::*;
pub use framebuffer::*;
pub use lighting::*;
pub use math::*;
pub use pipeline::*;
pub use render::*;
pub use types::*;

/// Depth value meaning "nothing drawn yet"
pub const DEPTH_CLEAR: f32 = 1_000_000.0;

/// Default screen dimensions (authentic PS1 resolution)
pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 240;

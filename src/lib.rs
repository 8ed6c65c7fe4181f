//! sunraster - PS1-style software triangle rasterizer
//!
//! Turns 3-D triangles and lines into a packed ARGB color buffer through a
//! shared geometry pipeline (transform, near clip, perspective divide,
//! screen mapping, flat sun lighting) and one of two backends that produce
//! the same image:
//!
//! - [`backend::ScalarBackend`] writes pixels as primitives are submitted.
//! - [`backend::ComputeBackend`] batches primitives by texture and dispatches
//!   16x16 tiles on a worker pool when the frame ends.
//!
//! Pixels nothing was drawn on are filled afterwards by a [`Background`]:
//! a solid color, a seeded star field or a cubemap skybox.
//!
//! ```no_run
//! use sunraster::{EngineConfig, Mat4, Renderer, Triangle, Vertex, Vec3};
//!
//! let config = EngineConfig::default();
//! let mut renderer = Renderer::new(config.clone())?;
//! let ctx = config.frame_context(Mat4::translation(Vec3::new(0.0, 0.0, 3.0)));
//!
//! renderer.begin_frame()?;
//! renderer.draw_triangle(&ctx, &Triangle::solid([
//!     Vertex::from_pos(-0.5, 0.5, 0.0, 0xFFFF0000),
//!     Vertex::from_pos(0.5, 0.5, 0.0, 0xFFFF0000),
//!     Vertex::from_pos(-0.5, -0.5, 0.0, 0xFFFF0000),
//! ]))?;
//! let pixels = renderer.end_frame()?;
//! # let _ = pixels;
//! # Ok::<(), sunraster::RasterError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod rasterizer;
pub mod renderer;

pub use backend::{ComputeBackend, FrameStats, RasterBackend, ScalarBackend};
pub use config::{load_config, save_config, BackendKind, CameraConfig, EngineConfig};
pub use error::{BackendError, ConfigError, RasterError, Result};
pub use rasterizer::*;
pub use renderer::{Material, Renderer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

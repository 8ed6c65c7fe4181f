//! Frame lifecycle: owns the framebuffer and the selected backend

use log::{debug, info, trace, warn};

use crate::backend::{ComputeBackend, FrameStats, RasterBackend, ScalarBackend};
use crate::config::{check_dimensions, BackendKind, EngineConfig};
use crate::error::{RasterError, Result};
use crate::rasterizer::{
    prepare_line, prepare_triangle, Background, BackgroundPass, FrameContext, Framebuffer, Line, Mat4, TextureHandle,
    Triangle, TriangleSetup, Vertex, Viewport,
};

/// How an indexed mesh is drawn
#[derive(Debug, Clone, Default)]
pub struct Material {
    /// Bound texture; `None` draws the mesh solid
    pub texture: Option<TextureHandle>,
    /// Replaces every vertex color when set
    pub color: Option<u32>,
}

impl Material {
    pub fn solid(color: u32) -> Self {
        Self {
            texture: None,
            color: Some(color),
        }
    }

    pub fn textured(texture: TextureHandle) -> Self {
        Self {
            texture: Some(texture),
            color: None,
        }
    }
}

/// Begin frame, submit primitives, end frame, read pixels.
///
/// Draw calls outside a begin/end pair are rejected with
/// [`RasterError::FrameNotStarted`]. After the backend finishes, the
/// background pass fills every pixel nothing was drawn on.
pub struct Renderer {
    config: EngineConfig,
    framebuffer: Framebuffer,
    backend: Box<dyn RasterBackend>,
    background: BackgroundPass,
    /// View and projection the skybox is sampled with
    camera: (Mat4, Mat4),
    frame_open: bool,
    culled_by_clip: usize,
    culled_backface: usize,
    last_stats: FrameStats,
}

impl Renderer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        if check_dimensions(config.width, config.height).is_err() {
            return Err(RasterError::InvalidDimensions {
                width: config.width,
                height: config.height,
            });
        }
        config.validate()?;

        let backend: Box<dyn RasterBackend> = match config.backend {
            BackendKind::Scalar => Box::new(ScalarBackend::new()),
            BackendKind::Compute => match ComputeBackend::new(config.worker_threads) {
                Ok(backend) => Box::new(backend),
                Err(e) if config.fallback_to_scalar => {
                    warn!("compute backend unavailable ({}), falling back to scalar", e);
                    Box::new(ScalarBackend::new())
                }
                Err(e) => return Err(e.into()),
            },
        };

        info!(
            "renderer created: {}x{}, {} backend",
            config.width,
            config.height,
            backend.name()
        );

        let background = match config.star_field {
            Some(field) => Background::StarField(field),
            None => Background::Solid(config.clear_color),
        };

        Ok(Self {
            framebuffer: Framebuffer::new(config.width, config.height),
            background: BackgroundPass::new(background),
            camera: (Mat4::IDENTITY, config.camera.projection(config.aspect())),
            config,
            backend,
            frame_open: false,
            culled_by_clip: 0,
            culled_backface: 0,
            last_stats: FrameStats::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the backend actually in use (after any fallback)
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn width(&self) -> usize {
        self.framebuffer.width
    }

    pub fn height(&self) -> usize {
        self.framebuffer.height
    }

    fn viewport(&self) -> Viewport {
        self.config.viewport()
    }

    pub fn background(&self) -> &Background {
        self.background.background()
    }

    /// Replace the background; takes effect at the next `end_frame`
    pub fn set_background(&mut self, background: Background) {
        self.background.set(background);
    }

    /// Camera for the skybox. Every draw call also records its context's
    /// view and projection, so this is only needed for frames with no
    /// geometry.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.camera = (view, projection);
    }

    /// Clear color and depth and start accepting submissions
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.frame_open {
            return Err(RasterError::FrameInProgress);
        }
        self.backend.begin_frame(&mut self.framebuffer, self.config.clear_color);
        self.culled_by_clip = 0;
        self.culled_backface = 0;
        self.frame_open = true;
        Ok(())
    }

    fn require_frame(&self) -> Result<()> {
        if self.frame_open {
            Ok(())
        } else {
            Err(RasterError::FrameNotStarted)
        }
    }

    pub fn draw_triangle(&mut self, ctx: &FrameContext, tri: &Triangle) -> Result<()> {
        self.require_frame()?;
        self.camera = (ctx.view, ctx.projection);
        let viewport = self.viewport();
        let screen = prepare_triangle(tri, ctx, &viewport);
        if screen.is_empty() {
            self.culled_by_clip += 1;
            return Ok(());
        }

        let stage = ctx.fragment_stage();
        for t in screen.as_slice() {
            if TriangleSetup::new(t).is_none() {
                trace!("culled back-facing or degenerate triangle");
                self.culled_backface += 1;
                continue;
            }
            self.backend
                .submit_triangle(&mut self.framebuffer, t, tri.texture.as_ref(), &stage);
        }
        Ok(())
    }

    pub fn draw_line(&mut self, ctx: &FrameContext, line: &Line) -> Result<()> {
        self.require_frame()?;
        self.camera = (ctx.view, ctx.projection);
        let viewport = self.viewport();
        match prepare_line(line, ctx, &viewport) {
            Some((a, b)) => {
                let stage = ctx.fragment_stage();
                self.backend
                    .submit_line(&mut self.framebuffer, &a, &b, line.color, &stage);
            }
            None => self.culled_by_clip += 1,
        }
        Ok(())
    }

    /// Draw an indexed triangle list.
    ///
    /// Indices are read in triplets; a trailing partial triplet is ignored and
    /// triangles with an out-of-range index are skipped. Returns the number of
    /// triangles submitted.
    pub fn draw_mesh(
        &mut self,
        ctx: &FrameContext,
        vertices: &[Vertex],
        indices: &[u32],
        material: &Material,
    ) -> Result<usize> {
        self.require_frame()?;
        let mut submitted = 0;
        let mut skipped = 0;

        for triplet in indices.chunks_exact(3) {
            let fetch = |i: u32| vertices.get(i as usize).copied();
            let (a, b, c) = match (fetch(triplet[0]), fetch(triplet[1]), fetch(triplet[2])) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let mut tri = Triangle {
                vertices: [a, b, c],
                texture: material.texture.clone(),
            };
            if let Some(color) = material.color {
                for v in &mut tri.vertices {
                    v.color = color;
                }
            }
            self.draw_triangle(ctx, &tri)?;
            submitted += 1;
        }

        if skipped > 0 {
            warn!(
                "skipped {} mesh triangles with indices outside {} vertices",
                skipped,
                vertices.len()
            );
        }
        Ok(submitted)
    }

    /// Finish the frame and return the final color buffer
    pub fn end_frame(&mut self) -> Result<&[u32]> {
        self.require_frame()?;
        self.frame_open = false;

        let mut stats = self.backend.end_frame(&mut self.framebuffer)?;
        stats.culled_by_clip = self.culled_by_clip;
        stats.culled_backface = self.culled_backface;
        let (view, projection) = self.camera;
        stats.background_pixels = self.background.run(&mut self.framebuffer, &view, &projection);
        debug!(
            "frame done: {} solid, {} textured, {} lines, {} batches, {} dispatches",
            stats.solid_triangles, stats.textured_triangles, stats.lines, stats.batches, stats.dispatches
        );
        self.last_stats = stats;
        Ok(&self.framebuffer.pixels)
    }

    /// Statistics of the last completed frame
    pub fn stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn pixels(&self) -> &[u32] {
        &self.framebuffer.pixels
    }

    pub fn depth(&self) -> &[f32] {
        &self.framebuffer.zbuffer
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Copy the color buffer into caller memory
    pub fn read_back(&self, out: &mut [u32]) {
        self.framebuffer.read_back(out);
    }

    /// Reallocate the buffers. Not allowed mid-frame.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        if self.frame_open {
            return Err(RasterError::FrameInProgress);
        }
        if check_dimensions(width, height).is_err() {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        self.config.width = width;
        self.config.height = height;
        self.framebuffer.resize(width, height);
        info!("renderer resized to {}x{}", width, height);
        Ok(())
    }

    /// Release buffers and the worker pool
    pub fn shutdown(self) {}
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.framebuffer.release();
        info!("renderer shut down ({} backend)", self.backend.name());
    }
}

//! Compute backend: batched submissions, tiled parallel dispatch at frame end

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::kernel::{self, GpuVertex, KernelParams, FLAG_SOLID, FLAG_TEXTURED};
use super::{FrameStats, RasterBackend};
use crate::error::BackendError;
use crate::rasterizer::{FragmentStage, Framebuffer, TextureHandle, Vertex};

/// Triangles sharing one texture and one pixel stage
struct TextureBatch {
    texture: TextureHandle,
    width: usize,
    height: usize,
    stage: usize,
    vertices: Vec<GpuVertex>,
}

impl TextureBatch {
    fn matches(&self, texture: &TextureHandle, stage: usize) -> bool {
        Arc::ptr_eq(&self.texture, texture)
            && self.width == texture.width
            && self.height == texture.height
            && self.stage == stage
    }
}

/// Untextured triangles and lines for one pixel stage
struct SolidBatch {
    stage: usize,
    triangles: Vec<GpuVertex>,
    lines: Vec<GpuVertex>,
}

pub struct ComputeBackend {
    pool: ThreadPool,
    stages: Vec<FragmentStage>,
    textured: Vec<TextureBatch>,
    solid: Vec<SolidBatch>,
    stats: FrameStats,
}

impl std::fmt::Debug for ComputeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeBackend")
            .field("threads", &self.pool.current_num_threads())
            .field("textured_batches", &self.textured.len())
            .field("solid_batches", &self.solid.len())
            .finish()
    }
}

impl ComputeBackend {
    /// Build the worker pool. `threads == 0` uses one worker per core.
    pub fn new(threads: usize) -> Result<Self, BackendError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sunraster-tile-{i}"))
            .build()?;
        log::debug!("compute pool ready with {} workers", pool.current_num_threads());
        Ok(Self {
            pool,
            stages: Vec::new(),
            textured: Vec::new(),
            solid: Vec::new(),
            stats: FrameStats::default(),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Index of an equivalent stage, registering it if new
    fn stage_slot(&mut self, stage: &FragmentStage) -> usize {
        if let Some(i) = self.stages.iter().rposition(|s| s.same_as(stage)) {
            return i;
        }
        self.stages.push(stage.clone());
        self.stages.len() - 1
    }

    fn solid_batch(&mut self, stage: usize) -> &mut SolidBatch {
        let idx = match self.solid.iter().position(|b| b.stage == stage) {
            Some(i) => i,
            None => {
                self.solid.push(SolidBatch {
                    stage,
                    triangles: Vec::new(),
                    lines: Vec::new(),
                });
                self.solid.len() - 1
            }
        };
        &mut self.solid[idx]
    }

    fn run(
        &mut self,
        fb: &mut Framebuffer,
        params: KernelParams,
        vertices: &[GpuVertex],
        texels: &[u32],
        stage: usize,
    ) -> Result<(), BackendError> {
        let written = kernel::dispatch(
            &self.pool,
            &params,
            bytemuck::cast_slice(vertices),
            texels,
            &self.stages[stage],
            fb,
        )?;
        self.stats.dispatches += 1;
        self.stats.pixels_written += written;
        log::debug!(
            "dispatch {}: {} triangles, {} lines, texture={}, {} pixels",
            self.stats.dispatches,
            params.triangle_count,
            params.line_count,
            params.use_texture != 0,
            written
        );
        Ok(())
    }
}

impl RasterBackend for ComputeBackend {
    fn name(&self) -> &'static str {
        "compute"
    }

    fn begin_frame(&mut self, fb: &mut Framebuffer, clear_color: u32) {
        fb.clear(clear_color);
        self.stages.clear();
        self.textured.clear();
        self.solid.clear();
        self.stats = FrameStats::default();
    }

    fn submit_triangle(
        &mut self,
        _fb: &mut Framebuffer,
        tri: &[Vertex; 3],
        texture: Option<&TextureHandle>,
        stage: &FragmentStage,
    ) {
        let slot = self.stage_slot(stage);
        match texture {
            Some(texture) => {
                self.stats.textured_triangles += 1;
                let packed = tri.iter().map(|v| GpuVertex::pack(v, FLAG_TEXTURED));
                match self.textured.iter_mut().find(|b| b.matches(texture, slot)) {
                    Some(batch) => batch.vertices.extend(packed),
                    None => self.textured.push(TextureBatch {
                        texture: Arc::clone(texture),
                        width: texture.width,
                        height: texture.height,
                        stage: slot,
                        vertices: packed.collect(),
                    }),
                }
            }
            None => {
                self.stats.solid_triangles += 1;
                let batch = self.solid_batch(slot);
                batch.triangles.extend(tri.iter().map(|v| GpuVertex::pack(v, FLAG_SOLID)));
            }
        }
    }

    fn submit_line(&mut self, _fb: &mut Framebuffer, start: &Vertex, end: &Vertex, color: u32, stage: &FragmentStage) {
        let slot = self.stage_slot(stage);
        self.stats.lines += 1;
        let batch = self.solid_batch(slot);
        for v in [start, end] {
            let mut packed = GpuVertex::pack(v, FLAG_SOLID);
            packed.color = color;
            batch.lines.push(packed);
        }
    }

    fn end_frame(&mut self, fb: &mut Framebuffer) -> Result<FrameStats, BackendError> {
        let base = KernelParams {
            screen_width: fb.width as u32,
            screen_height: fb.height as u32,
            ..KernelParams::default()
        };

        // Textured batches first, one dispatch each
        let textured = std::mem::take(&mut self.textured);
        for batch in &textured {
            let params = KernelParams {
                triangle_count: (batch.vertices.len() / 3) as u32,
                tex_width: batch.width as u32,
                tex_height: batch.height as u32,
                use_texture: 1,
                uv_debug: self.stages[batch.stage].uv_debug as u32,
                ..base
            };
            self.run(fb, params, &batch.vertices, &batch.texture.pixels, batch.stage)?;
        }

        // Then solid triangles and lines together
        let solid = std::mem::take(&mut self.solid);
        for batch in &solid {
            let params = KernelParams {
                triangle_count: (batch.triangles.len() / 3) as u32,
                line_count: (batch.lines.len() / 2) as u32,
                uv_debug: self.stages[batch.stage].uv_debug as u32,
                ..base
            };
            let mut vertices = Vec::with_capacity(batch.triangles.len() + batch.lines.len());
            vertices.extend_from_slice(&batch.triangles);
            vertices.extend_from_slice(&batch.lines);
            self.run(fb, params, &vertices, &[], batch.stage)?;
        }

        self.stats.batches = textured.len() + solid.len();
        self.stages.clear();
        Ok(std::mem::take(&mut self.stats))
    }
}

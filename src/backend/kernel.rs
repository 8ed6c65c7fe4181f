//! Tile kernel for the compute backend
//!
//! Mirrors a GPU compute dispatch: primitives arrive as a packed vertex
//! storage buffer plus a small uniform block, and the work is split into
//! 16x16 pixel groups. Each group copies its tile of the framebuffer, runs
//! the shared scan-conversion routines against it and hands the tile back.

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::BackendError;
use crate::rasterizer::{
    draw_line, rasterize_triangle, DepthTarget, FragmentStage, Framebuffer, PixelRect, TexelSource, Vec2, Vec4,
    Vertex,
};

/// Work group edge length in pixels
pub const TILE_SIZE: usize = 16;

pub const FLAG_SOLID: u32 = 0;
pub const FLAG_TEXTURED: u32 = 1;

/// One vertex in the storage buffer: eight 32-bit words
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub color: u32,
    pub u: f32,
    pub v: f32,
    /// `FLAG_SOLID` or `FLAG_TEXTURED`
    pub flag: u32,
}

impl GpuVertex {
    pub fn pack(v: &Vertex, flag: u32) -> Self {
        Self {
            x: v.pos.x,
            y: v.pos.y,
            z: v.pos.z,
            w: v.pos.w,
            color: v.color,
            u: v.uv.x,
            v: v.uv.y,
            flag,
        }
    }

    pub fn unpack(&self) -> Vertex {
        Vertex::new(Vec4::new(self.x, self.y, self.z, self.w), self.color, Vec2::new(self.u, self.v))
    }
}

/// Uniform block shared by every group of one dispatch
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct KernelParams {
    pub screen_width: u32,
    pub screen_height: u32,
    pub triangle_count: u32,
    pub line_count: u32,
    pub tex_width: u32,
    pub tex_height: u32,
    pub use_texture: u32,
    pub uv_debug: u32,
}

impl KernelParams {
    /// Number of work groups along x and y
    pub fn groups(&self) -> (usize, usize) {
        let w = self.screen_width as usize;
        let h = self.screen_height as usize;
        ((w + TILE_SIZE - 1) / TILE_SIZE, (h + TILE_SIZE - 1) / TILE_SIZE)
    }

    fn vertex_count(&self) -> usize {
        self.triangle_count as usize * 3 + self.line_count as usize * 2
    }
}

/// Group-local copy of one framebuffer tile
struct TileBuffer {
    rect: PixelRect,
    pixels: Vec<u32>,
    depth: Vec<f32>,
    dirty: bool,
}

impl TileBuffer {
    fn load(fb: &Framebuffer, rect: PixelRect) -> Self {
        let w = rect.width();
        let mut pixels = Vec::with_capacity(w * rect.height());
        let mut depth = Vec::with_capacity(w * rect.height());
        for y in rect.min_y..rect.max_y {
            let row = y * fb.width;
            pixels.extend_from_slice(&fb.pixels[row + rect.min_x..row + rect.max_x]);
            depth.extend_from_slice(&fb.zbuffer[row + rect.min_x..row + rect.max_x]);
        }
        Self {
            rect,
            pixels,
            depth,
            dirty: false,
        }
    }

    fn store(&self, fb: &mut Framebuffer) {
        let w = self.rect.width();
        for (i, y) in (self.rect.min_y..self.rect.max_y).enumerate() {
            let row = y * fb.width;
            let local = i * w..(i + 1) * w;
            fb.pixels[row + self.rect.min_x..row + self.rect.max_x].copy_from_slice(&self.pixels[local.clone()]);
            fb.zbuffer[row + self.rect.min_x..row + self.rect.max_x].copy_from_slice(&self.depth[local]);
        }
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        (y - self.rect.min_y) * self.rect.width() + (x - self.rect.min_x)
    }
}

impl DepthTarget for TileBuffer {
    #[inline]
    fn depth(&self, x: usize, y: usize) -> f32 {
        self.depth[self.index(x, y)]
    }

    #[inline]
    fn write(&mut self, x: usize, y: usize, z: f32, color: u32) {
        let idx = self.index(x, y);
        self.depth[idx] = z;
        self.pixels[idx] = color;
        self.dirty = true;
    }
}

/// Run one dispatch over the whole framebuffer.
///
/// `vertices` holds `triangle_count * 3` triangle vertices followed by
/// `line_count * 2` line endpoints. Blocks until every group has finished.
/// Returns the number of pixels written.
pub fn dispatch(
    pool: &ThreadPool,
    params: &KernelParams,
    vertices: &[u8],
    texels: &[u32],
    stage: &FragmentStage,
    fb: &mut Framebuffer,
) -> Result<usize, BackendError> {
    let verts: &[GpuVertex] =
        bytemuck::try_cast_slice(vertices).map_err(|_| BackendError::VertexBuffer(vertices.len()))?;
    if verts.len() != params.vertex_count() {
        return Err(BackendError::VertexBuffer(vertices.len()));
    }

    let (tri_verts, line_verts) = verts.split_at(params.triangle_count as usize * 3);
    let triangles: Vec<[Vertex; 3]> = tri_verts
        .chunks_exact(3)
        .map(|t| [t[0].unpack(), t[1].unpack(), t[2].unpack()])
        .collect();
    let lines: Vec<(Vertex, Vertex, u32)> = line_verts
        .chunks_exact(2)
        .map(|l| (l[0].unpack(), l[1].unpack(), l[0].color))
        .collect();

    let texture = (params.use_texture != 0)
        .then(|| TexelSource::new(texels, params.tex_width as usize, params.tex_height as usize));
    let stage = FragmentStage {
        uv_debug: params.uv_debug != 0,
        ..stage.clone()
    };

    let width = (params.screen_width as usize).min(fb.width);
    let height = (params.screen_height as usize).min(fb.height);
    let (groups_x, groups_y) = params.groups();
    let shared: &Framebuffer = fb;

    let tiles: Vec<(TileBuffer, usize)> = pool.install(|| {
        (0..groups_x * groups_y)
            .into_par_iter()
            .filter_map(|group| {
                let gx = group % groups_x;
                let gy = group / groups_x;
                let rect = PixelRect::new(
                    gx * TILE_SIZE,
                    gy * TILE_SIZE,
                    ((gx + 1) * TILE_SIZE).min(width),
                    ((gy + 1) * TILE_SIZE).min(height),
                );
                if rect.is_empty() {
                    return None;
                }

                let mut tile = TileBuffer::load(shared, rect);
                let mut written = 0;
                for (tri, gpu) in triangles.iter().zip(tri_verts.chunks_exact(3)) {
                    let tex = if gpu[0].flag == FLAG_TEXTURED { texture.as_ref() } else { None };
                    written += rasterize_triangle(&mut tile, rect, tri, tex, &stage);
                }
                for (a, b, color) in &lines {
                    written += draw_line(&mut tile, rect, a, b, *color, &stage);
                }
                if tile.dirty {
                    Some((tile, written))
                } else {
                    None
                }
            })
            .collect()
    });

    let mut total = 0;
    for (tile, written) in &tiles {
        tile.store(fb);
        total += written;
    }
    Ok(total)
}

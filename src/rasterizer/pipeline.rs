//! Geometry pipeline shared by both backends
//!
//! model -> (vertex hook) -> world -> lighting -> view -> near clip ->
//! projection -> perspective divide -> screen. Everything here is a pure
//! function of the inputs and the [`FrameContext`].

use std::sync::Arc;

use super::clip::{clip_line, clip_triangle, ClippedTriangles};
use super::lighting::{face_normal, lighting_factor, lit_vertex_color, Light};
use super::math::Mat4;
use super::render::FragmentStage;
use super::types::{TextureHandle, Vertex};

/// Per-vertex hook applied to model-space vertices before the world transform
pub type VertexTransformFn = Arc<dyn Fn(Vertex) -> Vertex + Send + Sync>;

/// Per-fragment hook applied to every shaded color, in both backends
pub type PixelShadeFn = Arc<dyn Fn(u32) -> u32 + Send + Sync>;

/// Everything the pipeline needs for one batch of submissions.
///
/// Replaces process-wide "current matrix" state: callers build one per object
/// (or per frame) and pass it into every draw call.
#[derive(Clone)]
pub struct FrameContext {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// View-space near plane; must match the projection's near parameter
    pub near: f32,
    pub light: Light,
    pub uv_debug: bool,
    pub vertex_shader: Option<VertexTransformFn>,
    pub pixel_shader: Option<PixelShadeFn>,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            near: 0.1,
            light: Light::default(),
            uv_debug: false,
            vertex_shader: None,
            pixel_shader: None,
        }
    }
}

impl std::fmt::Debug for FrameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameContext")
            .field("world", &self.world)
            .field("view", &self.view)
            .field("projection", &self.projection)
            .field("near", &self.near)
            .field("light", &self.light)
            .field("uv_debug", &self.uv_debug)
            .field("vertex_shader", &self.vertex_shader.is_some())
            .field("pixel_shader", &self.pixel_shader.is_some())
            .finish()
    }
}

impl FrameContext {
    pub fn new(view: Mat4, projection: Mat4, near: f32) -> Self {
        Self {
            view,
            projection,
            near,
            ..Self::default()
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.light = light;
        self
    }

    pub fn with_vertex_shader(mut self, hook: VertexTransformFn) -> Self {
        self.vertex_shader = Some(hook);
        self
    }

    pub fn with_pixel_shader(mut self, hook: PixelShadeFn) -> Self {
        self.pixel_shader = Some(hook);
        self
    }

    /// Pixel-stage parameters handed to the backend
    pub fn fragment_stage(&self) -> FragmentStage {
        FragmentStage {
            sun_color: self.light.sun_color,
            uv_debug: self.uv_debug,
            pixel_shader: self.pixel_shader.clone(),
        }
    }

    fn model(&self, v: Vertex) -> Vertex {
        match &self.vertex_shader {
            Some(hook) => hook(v),
            None => v,
        }
    }
}

/// Triangle submission. Textured iff `texture` is set.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
    pub texture: Option<TextureHandle>,
}

impl Triangle {
    pub fn solid(vertices: [Vertex; 3]) -> Self {
        Self { vertices, texture: None }
    }

    pub fn textured(vertices: [Vertex; 3], texture: TextureHandle) -> Self {
        Self {
            vertices,
            texture: Some(texture),
        }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

/// Line submission: flat color, never lit or textured
#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub start: Vertex,
    pub end: Vertex,
    pub color: u32,
}

impl Line {
    pub fn new(start: Vertex, end: Vertex, color: u32) -> Self {
        Self { start, end, color }
    }
}

/// Target dimensions for the final screen mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
    /// Truncate screen coordinates to whole pixels
    pub snap: bool,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, snap: true }
    }
}

fn apply(m: &Mat4, mut v: Vertex) -> Vertex {
    v.pos = m.transform_vec4(v.pos);
    v
}

/// Model space to view space
pub fn to_view(v: Vertex, world: &Mat4, view: &Mat4) -> Vertex {
    apply(view, apply(world, v))
}

/// View space to clip space
pub fn project(v: Vertex, projection: &Mat4) -> Vertex {
    apply(projection, v)
}

/// Model space to clip space: world, then view, then projection. No divide.
pub fn transform(v: Vertex, world: &Mat4, view: &Mat4, projection: &Mat4) -> Vertex {
    project(to_view(v, world, view), projection)
}

/// Divide x, y, z by w. `w == 0` leaves the vertex unchanged.
pub fn perspective_divide(mut v: Vertex) -> Vertex {
    let w = v.pos.w;
    if w != 0.0 {
        v.pos.x /= w;
        v.pos.y /= w;
        v.pos.z /= w;
    }
    v
}

/// NDC to pixel coordinates, y pointing down
pub fn to_screen(mut v: Vertex, viewport: &Viewport) -> Vertex {
    let half_w = viewport.width as f32 / 2.0;
    let half_h = viewport.height as f32 / 2.0;
    let mut x = (v.pos.x + 1.0) * half_w;
    let mut y = (1.0 - v.pos.y) * half_h;
    if viewport.snap {
        x = x.trunc();
        y = y.trunc();
    }
    v.pos.x = x;
    v.pos.y = y;
    v
}

fn view_to_screen(v: Vertex, ctx: &FrameContext, viewport: &Viewport) -> Vertex {
    to_screen(perspective_divide(project(v, &ctx.projection)), viewport)
}

/// Run a triangle through the whole geometry pipeline.
///
/// Returns zero, one or two screen-space triangles ready for either backend,
/// with lighting already folded into the vertex colors.
pub fn prepare_triangle(tri: &Triangle, ctx: &FrameContext, viewport: &Viewport) -> ClippedTriangles {
    let model = tri.vertices.map(|v| ctx.model(v));
    let world = model.map(|v| apply(&ctx.world, v));

    let normal = face_normal(world[0].pos, world[1].pos, world[2].pos);
    let factor = lighting_factor(normal, &ctx.light);
    let textured = tri.is_textured();

    let view = world.map(|mut v| {
        v.color = lit_vertex_color(v.color, factor, textured, ctx.light.sun_color);
        apply(&ctx.view, v)
    });

    clip_triangle(&view, ctx.near).map(|v| view_to_screen(v, ctx, viewport))
}

/// Run a line through the pipeline. `None` when it lies behind the near plane.
pub fn prepare_line(line: &Line, ctx: &FrameContext, viewport: &Viewport) -> Option<(Vertex, Vertex)> {
    let a = to_view(ctx.model(line.start), &ctx.world, &ctx.view);
    let b = to_view(ctx.model(line.end), &ctx.world, &ctx.view);
    let (a, b) = clip_line(&a, &b, ctx.near)?;
    Some((view_to_screen(a, ctx, viewport), view_to_screen(b, ctx, viewport)))
}

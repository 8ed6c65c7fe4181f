//! Triangle and line scan-conversion
//!
//! Both backends run these exact routines: the scalar backend over the whole
//! framebuffer, the compute backend once per 16x16 tile with `clip` set to
//! the tile rectangle. Keeping one implementation is what makes their images
//! match.

use super::lighting::modulate_texel;
use super::math::{lerp, Vec2, Vec3, Vec4};
use super::pipeline::PixelShadeFn;
use super::types::{sample_nearest, Texture, Vertex};

/// Signed areas with a smaller magnitude count as degenerate
pub const AREA_EPSILON: f32 = 1e-6;

/// Half-open pixel rectangle `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl PixelRect {
    pub const fn new(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub fn width(&self) -> usize {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> usize {
        self.max_y.saturating_sub(self.min_y)
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.min_x as i64 && x < self.max_x as i64 && y >= self.min_y as i64 && y < self.max_y as i64
    }
}

/// Depth-tested pixel storage addressed in framebuffer coordinates.
///
/// Callers only pass coordinates inside the rectangle they rasterize against.
pub trait DepthTarget {
    fn depth(&self, x: usize, y: usize) -> f32;
    fn write(&mut self, x: usize, y: usize, z: f32, color: u32);
}

/// Borrowed texels of a bound texture
#[derive(Debug, Clone, Copy)]
pub struct TexelSource<'a> {
    pub texels: &'a [u32],
    pub width: usize,
    pub height: usize,
}

impl<'a> TexelSource<'a> {
    pub fn new(texels: &'a [u32], width: usize, height: usize) -> Self {
        Self { texels, width, height }
    }

    #[inline]
    pub fn sample(&self, u: f32, v: f32) -> u32 {
        sample_nearest(self.texels, self.width, self.height, u, v)
    }
}

impl<'a> From<&'a Texture> for TexelSource<'a> {
    fn from(tex: &'a Texture) -> Self {
        Self::new(&tex.pixels, tex.width, tex.height)
    }
}

/// Per-frame pixel stage: sun tint for textured fragments, UV debug view and
/// the optional pixel hook.
#[derive(Clone)]
pub struct FragmentStage {
    pub sun_color: Vec3,
    pub uv_debug: bool,
    pub pixel_shader: Option<PixelShadeFn>,
}

impl Default for FragmentStage {
    fn default() -> Self {
        Self {
            sun_color: Vec3::ONE,
            uv_debug: false,
            pixel_shader: None,
        }
    }
}

impl std::fmt::Debug for FragmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStage")
            .field("sun_color", &self.sun_color)
            .field("uv_debug", &self.uv_debug)
            .field("pixel_shader", &self.pixel_shader.is_some())
            .finish()
    }
}

impl FragmentStage {
    /// Final color of a triangle fragment.
    ///
    /// `base` is the triangle's vertex-0 color: already lit when untextured,
    /// the gray lighting word when textured.
    #[inline]
    pub fn shade(&self, base: u32, uv: Vec2, texels: Option<&TexelSource<'_>>) -> u32 {
        let color = match texels {
            Some(_) if self.uv_debug => uv_debug_color(uv),
            Some(tex) => modulate_texel(tex.sample(uv.x, uv.y), base, self.sun_color),
            None => base,
        };
        self.finish(color)
    }

    /// Same tint, debug flag and hook instance
    pub fn same_as(&self, other: &FragmentStage) -> bool {
        let hooks_match = match (&self.pixel_shader, &other.pixel_shader) {
            (Some(a), Some(b)) => std::sync::Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        hooks_match && self.uv_debug == other.uv_debug && self.sun_color == other.sun_color
    }

    /// Run the pixel hook, if any
    #[inline]
    pub fn finish(&self, color: u32) -> u32 {
        match &self.pixel_shader {
            Some(hook) => hook(color),
            None => color,
        }
    }
}

/// Red = u, green = v
pub fn uv_debug_color(uv: Vec2) -> u32 {
    let r = (uv.x.clamp(0.0, 1.0) * 255.0) as u32;
    let g = (uv.y.clamp(0.0, 1.0) * 255.0) as u32;
    0xFF00_0000 | (r << 16) | (g << 8)
}

/// Screen-space signed area (times two).
///
/// Negative is front-facing: with y pointing down, (0,0) (1,0) (0,1) is
/// visible and swapping any two vertices makes it back-facing.
#[inline]
pub fn signed_area(a: Vec4, b: Vec4, c: Vec4) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

/// Line equation through `s -> e` evaluated at (x, y)
#[inline]
fn edge(s: Vec4, e: Vec4, x: f32, y: f32) -> f32 {
    (s.y - e.y) * x + (e.x - s.x) * y + (s.x * e.y - s.y * e.x)
}

/// Per-triangle setup: culling decision and barycentric normalizers
#[derive(Debug, Clone, Copy)]
pub struct TriangleSetup {
    pub v: [Vertex; 3],
    inv_d0: f32,
    inv_d1: f32,
    inv_d2: f32,
}

impl TriangleSetup {
    /// `None` for back-facing, degenerate or NaN triangles
    pub fn new(v: &[Vertex; 3]) -> Option<Self> {
        let (p0, p1, p2) = (v[0].pos, v[1].pos, v[2].pos);
        let area = signed_area(p0, p1, p2);
        // Also rejects NaN
        if !(area < -AREA_EPSILON) {
            return None;
        }

        let d0 = edge(p2, p1, p0.x, p0.y);
        let d1 = edge(p0, p2, p1.x, p1.y);
        let d2 = edge(p1, p0, p2.x, p2.y);

        Some(Self {
            v: *v,
            inv_d0: 1.0 / d0,
            inv_d1: 1.0 / d1,
            inv_d2: 1.0 / d2,
        })
    }

    /// Barycentric weights of (x, y) for vertices 0, 1, 2
    #[inline]
    pub fn weights(&self, x: f32, y: f32) -> (f32, f32, f32) {
        let (p0, p1, p2) = (self.v[0].pos, self.v[1].pos, self.v[2].pos);
        (
            edge(p2, p1, x, y) * self.inv_d0,
            edge(p0, p2, x, y) * self.inv_d1,
            edge(p1, p0, x, y) * self.inv_d2,
        )
    }

    /// Inclusive pixel bounds of the triangle clipped to `clip`
    pub fn pixel_bounds(&self, clip: PixelRect) -> Option<(usize, usize, usize, usize)> {
        if clip.is_empty() {
            return None;
        }
        let xs = [self.v[0].pos.x, self.v[1].pos.x, self.v[2].pos.x];
        let ys = [self.v[0].pos.y, self.v[1].pos.y, self.v[2].pos.y];
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min).floor() as i64;
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min).floor() as i64;
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max).ceil() as i64;

        let min_x = min_x.max(clip.min_x as i64);
        let min_y = min_y.max(clip.min_y as i64);
        let max_x = max_x.min(clip.max_x as i64 - 1);
        let max_y = max_y.min(clip.max_y as i64 - 1);

        if min_x > max_x || min_y > max_y {
            return None;
        }
        Some((min_x as usize, min_y as usize, max_x as usize, max_y as usize))
    }
}

#[inline]
fn unit(w: f32) -> bool {
    (0.0..=1.0).contains(&w)
}

/// Rasterize one screen-space triangle into `target`, restricted to `clip`.
///
/// Returns the number of pixels that passed the depth test.
pub fn rasterize_triangle<T: DepthTarget>(
    target: &mut T,
    clip: PixelRect,
    tri: &[Vertex; 3],
    texels: Option<&TexelSource<'_>>,
    stage: &FragmentStage,
) -> usize {
    let setup = match TriangleSetup::new(tri) {
        Some(s) => s,
        None => return 0,
    };
    rasterize_setup(target, clip, &setup, texels, stage)
}

/// Same as [`rasterize_triangle`] for a triangle that was already set up
pub fn rasterize_setup<T: DepthTarget>(
    target: &mut T,
    clip: PixelRect,
    setup: &TriangleSetup,
    texels: Option<&TexelSource<'_>>,
    stage: &FragmentStage,
) -> usize {
    let (min_x, min_y, max_x, max_y) = match setup.pixel_bounds(clip) {
        Some(b) => b,
        None => return 0,
    };
    let [v0, v1, v2] = setup.v;
    let mut written = 0;

    for y in min_y..=max_y {
        let py = y as f32;
        for x in min_x..=max_x {
            let px = x as f32;
            let (a, b, c) = setup.weights(px, py);
            if !(unit(a) && unit(b) && unit(c)) {
                continue;
            }

            let z = a * v0.pos.z + b * v1.pos.z + c * v2.pos.z;
            if !(z < target.depth(x, y)) {
                continue;
            }

            // Affine: no perspective correction
            let uv = Vec2::new(
                a * v0.uv.x + b * v1.uv.x + c * v2.uv.x,
                a * v0.uv.y + b * v1.uv.y + c * v2.uv.y,
            );
            let color = stage.shade(v0.color, uv, texels);
            target.write(x, y, z, color);
            written += 1;
        }
    }

    written
}

/// Sample index range `[lo, hi]` along one axis that can land inside
/// `[lo_px, hi_px)`, widened by a pixel for truncation.
fn axis_range(start: f32, delta: f32, lo_px: f32, hi_px: f32, largest: f32) -> (f32, f32) {
    if delta == 0.0 {
        if start > lo_px - 1.0 && start < hi_px + 1.0 {
            (f32::NEG_INFINITY, f32::INFINITY)
        } else {
            (1.0, 0.0)
        }
    } else {
        let t0 = (lo_px - 1.0 - start) / delta * largest;
        let t1 = (hi_px + 1.0 - start) / delta * largest;
        (t0.min(t1), t0.max(t1))
    }
}

/// Draw a depth-tested line between two screen-space vertices.
///
/// Steps `max(|dx|, |dy|)` times (at least once), interpolating x, y and z;
/// samples outside `clip` are skipped. Returns the number of pixels written.
pub fn draw_line<T: DepthTarget>(
    target: &mut T,
    clip: PixelRect,
    start: &Vertex,
    end: &Vertex,
    color: u32,
    stage: &FragmentStage,
) -> usize {
    if clip.is_empty() {
        return 0;
    }
    let (a, b) = (start.pos, end.pos);
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    // f32::max drops a NaN operand, so check both deltas up front
    if !dx.is_finite() || !dy.is_finite() {
        return 0;
    }
    let mut largest = dx.abs().max(dy.abs());
    if largest < 1.0 {
        largest = 1.0;
    }
    let steps = largest as i64;

    let (lx, hx) = axis_range(a.x, dx, clip.min_x as f32, clip.max_x as f32, largest);
    let (ly, hy) = axis_range(a.y, dy, clip.min_y as f32, clip.max_y as f32, largest);
    let first = (lx.max(ly).floor() as i64).max(0);
    let last = (hx.min(hy).ceil() as i64).min(steps);

    let color = stage.finish(color);
    let mut written = 0;
    for i in first..=last {
        let ratio = i as f32 / largest;
        let px = lerp(a.x, b.x, ratio) as i64;
        let py = lerp(a.y, b.y, ratio) as i64;
        if !clip.contains(px, py) {
            continue;
        }
        let z = lerp(a.z, b.z, ratio);
        let (x, y) = (px as usize, py as usize);
        if z < target.depth(x, y) {
            target.write(x, y, z, color);
            written += 1;
        }
    }
    written
}

/// Create a simple test cube mesh: 24 vertices, 36 indices, outward faces
/// wound so they survive backface culling when facing the camera.
pub fn create_test_cube(color: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    let positions = [
        // Front face
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
        // Back face
        [-1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [1.0, 1.0, -1.0],
        [1.0, -1.0, -1.0],
        // Top face
        [-1.0, 1.0, -1.0],
        [-1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, -1.0],
        // Bottom face
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, -1.0, 1.0],
        [-1.0, -1.0, 1.0],
        // Right face
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [1.0, 1.0, 1.0],
        [1.0, -1.0, 1.0],
        // Left face
        [-1.0, -1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [-1.0, 1.0, 1.0],
        [-1.0, 1.0, -1.0],
    ];

    let uvs = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

    for face_idx in 0..6 {
        let base = face_idx * 4;
        for (i, &(u, v)) in uvs.iter().enumerate() {
            let [x, y, z] = positions[base + i];
            vertices.push(Vertex::from_pos(x, y, z, color).with_uv(u, v));
        }

        // Two triangles per face
        let b = base as u32;
        indices.extend_from_slice(&[b, b + 1, b + 2, b, b + 2, b + 3]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::framebuffer::Framebuffer;
    use std::sync::Arc;

    fn screen(x: f32, y: f32, z: f32, color: u32) -> Vertex {
        Vertex::new(Vec4::new(x, y, z, 1.0), color, Vec2::default())
    }

    #[test]
    fn test_winding_convention() {
        let a = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let b = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let c = Vec4::new(0.0, 1.0, 0.0, 1.0);
        assert!(signed_area(a, b, c) < 0.0);
        assert!(signed_area(a, c, b) > 0.0);
        assert!(signed_area(b, a, c) > 0.0);
        assert!(signed_area(c, b, a) > 0.0);
    }

    #[test]
    fn test_unit_triangle_retained_mirror_culled() {
        let tri = [
            screen(0.0, 0.0, 0.5, 1),
            screen(1.0, 0.0, 0.5, 1),
            screen(0.0, 1.0, 0.5, 1),
        ];
        assert!(TriangleSetup::new(&tri).is_some());
        let mirrored = [tri[0], tri[2], tri[1]];
        assert!(TriangleSetup::new(&mirrored).is_none());
    }

    #[test]
    fn test_degenerate_and_nan_skipped() {
        let line = [
            screen(0.0, 0.0, 0.5, 1),
            screen(5.0, 5.0, 0.5, 1),
            screen(10.0, 10.0, 0.5, 1),
        ];
        assert!(TriangleSetup::new(&line).is_none());

        let nan = [
            screen(f32::NAN, 0.0, 0.5, 1),
            screen(1.0, 0.0, 0.5, 1),
            screen(0.0, 1.0, 0.5, 1),
        ];
        assert!(TriangleSetup::new(&nan).is_none());
    }

    #[test]
    fn test_nan_line_draws_nothing() {
        let mut fb = Framebuffer::new(16, 16);
        let bounds = fb.bounds();
        let stage = FragmentStage::default();
        let good = screen(10.0, 12.0, 0.5, 0);

        for bad in [screen(f32::NAN, 2.0, 0.5, 0), screen(2.0, f32::NAN, 0.5, 0)] {
            assert_eq!(draw_line(&mut fb, bounds, &bad, &good, 7, &stage), 0);
            assert_eq!(draw_line(&mut fb, bounds, &good, &bad, 7, &stage), 0);
        }
        let inf = screen(f32::INFINITY, 2.0, 0.5, 0);
        assert_eq!(draw_line(&mut fb, bounds, &inf, &good, 7, &stage), 0);
        assert!(fb.pixels.iter().all(|&p| p != 7));
    }

    #[test]
    fn test_weights_sum_to_one() {
        let tri = [
            screen(0.0, 0.0, 0.5, 1),
            screen(10.0, 0.0, 0.5, 1),
            screen(0.0, 10.0, 0.5, 1),
        ];
        let setup = TriangleSetup::new(&tri).unwrap();
        let (a, b, c) = setup.weights(2.0, 3.0);
        assert!((a + b + c - 1.0).abs() < 1e-5);
        assert!((b - 0.2).abs() < 1e-5);
        assert!((c - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_fill_writes_inside_pixels_only() {
        let mut fb = Framebuffer::new(16, 16);
        let tri = [
            screen(2.0, 2.0, 0.5, 0xFFFF0000),
            screen(10.0, 2.0, 0.5, 0xFFFF0000),
            screen(2.0, 10.0, 0.5, 0xFFFF0000),
        ];
        let bounds = fb.bounds();
        let written = rasterize_triangle(&mut fb, bounds, &tri, None, &FragmentStage::default());
        assert!(written > 0);
        assert_eq!(fb.get_pixel(3, 3), Some(0xFFFF0000));
        assert_eq!(fb.get_pixel(12, 12), Some(0));
        assert_eq!(fb.get_pixel(9, 9), Some(0));
        assert!((fb.get_depth(3, 3).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_offscreen_vertices_are_clipped_to_buffer() {
        let mut fb = Framebuffer::new(8, 8);
        let tri = [
            screen(-100.0, -100.0, 0.5, 7),
            screen(300.0, -100.0, 0.5, 7),
            screen(-100.0, 300.0, 0.5, 7),
        ];
        let bounds = fb.bounds();
        let written = rasterize_triangle(&mut fb, bounds, &tri, None, &FragmentStage::default());
        assert_eq!(written, 64);
    }

    #[test]
    fn test_nearer_triangle_wins_regardless_of_order() {
        let stage = FragmentStage::default();
        let far = [
            screen(0.0, 0.0, 0.8, 0xFF0000FF),
            screen(8.0, 0.0, 0.8, 0xFF0000FF),
            screen(0.0, 8.0, 0.8, 0xFF0000FF),
        ];
        let near = [
            screen(0.0, 0.0, 0.2, 0xFF00FF00),
            screen(8.0, 0.0, 0.2, 0xFF00FF00),
            screen(0.0, 8.0, 0.2, 0xFF00FF00),
        ];

        let mut fb = Framebuffer::new(8, 8);
        let bounds = fb.bounds();
        rasterize_triangle(&mut fb, bounds, &near, None, &stage);
        rasterize_triangle(&mut fb, bounds, &far, None, &stage);
        assert_eq!(fb.get_pixel(1, 1), Some(0xFF00FF00));

        let mut fb = Framebuffer::new(8, 8);
        rasterize_triangle(&mut fb, bounds, &far, None, &stage);
        rasterize_triangle(&mut fb, bounds, &near, None, &stage);
        assert_eq!(fb.get_pixel(1, 1), Some(0xFF00FF00));
        assert!((fb.get_depth(1, 1).unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_textured_fill_samples_texels() {
        let tex = Texture::from_pixels(2, 1, vec![0xFF112233, 0xFF445566], "two");
        let texels = TexelSource::from(&tex);
        let mut fb = Framebuffer::new(8, 8);
        let white = 0xFFFFFFFF;
        let tri = [
            screen(0.0, 0.0, 0.5, white),
            screen(8.0, 0.0, 0.5, white),
            screen(0.0, 8.0, 0.5, white),
        ];
        let bounds = fb.bounds();
        rasterize_triangle(&mut fb, bounds, &tri, Some(&texels), &FragmentStage::default());
        // All UVs are zero
        assert_eq!(fb.get_pixel(1, 1), Some(0xFF112233));
    }

    #[test]
    fn test_pixel_shader_hook_applies() {
        let stage = FragmentStage {
            pixel_shader: Some(Arc::new(|_: u32| -> u32 { 0xFFFFFFFF }) as PixelShadeFn),
            ..FragmentStage::default()
        };
        let mut fb = Framebuffer::new(4, 4);
        let tri = [
            screen(0.0, 0.0, 0.5, 1),
            screen(4.0, 0.0, 0.5, 1),
            screen(0.0, 4.0, 0.5, 1),
        ];
        let bounds = fb.bounds();
        rasterize_triangle(&mut fb, bounds, &tri, None, &stage);
        assert_eq!(fb.get_pixel(0, 0), Some(0xFFFFFFFF));
    }

    #[test]
    fn test_line_covers_endpoints() {
        let mut fb = Framebuffer::new(16, 16);
        let a = screen(1.0, 1.0, 0.5, 0);
        let b = screen(9.0, 3.0, 0.5, 0);
        let bounds = fb.bounds();
        let written = draw_line(&mut fb, bounds, &a, &b, 0xFF00FFFF, &FragmentStage::default());
        assert_eq!(written, 9);
        assert_eq!(fb.get_pixel(1, 1), Some(0xFF00FFFF));
        assert_eq!(fb.get_pixel(9, 3), Some(0xFF00FFFF));
    }

    #[test]
    fn test_line_restricted_to_clip_rect() {
        let mut full = Framebuffer::new(32, 8);
        let a = screen(-16.0, 3.0, 0.5, 0);
        let b = screen(48.0, 3.0, 0.5, 0);
        let stage = FragmentStage::default();

        let bounds = full.bounds();
        draw_line(&mut full, bounds, &a, &b, 9, &stage);

        let mut halves = Framebuffer::new(32, 8);
        draw_line(&mut halves, PixelRect::new(0, 0, 16, 8), &a, &b, 9, &stage);
        draw_line(&mut halves, PixelRect::new(16, 0, 32, 8), &a, &b, 9, &stage);

        assert_eq!(full.pixels, halves.pixels);
        assert!(full.pixels[3 * 32..4 * 32].iter().all(|&p| p == 9));
    }

    #[test]
    fn test_test_cube_shape() {
        let (verts, indices) = create_test_cube(0xFFFFFFFF);
        assert_eq!(verts.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < verts.len()));
    }
}

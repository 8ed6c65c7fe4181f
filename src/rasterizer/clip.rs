//! Near-plane clipping in view space
//!
//! A vertex is inside when `pos.z >= near`. New vertices interpolate
//! position and UV from the inside vertex towards the outside one; color is
//! copied from the inside vertex (flat shading).

use super::types::Vertex;

/// Up to two triangles produced by clipping one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedTriangles {
    tris: [[Vertex; 3]; 2],
    count: usize,
}

impl ClippedTriangles {
    fn none() -> Self {
        Self {
            tris: [[Vertex::default(); 3]; 2],
            count: 0,
        }
    }

    fn one(tri: [Vertex; 3]) -> Self {
        Self {
            tris: [tri, [Vertex::default(); 3]],
            count: 1,
        }
    }

    fn two(a: [Vertex; 3], b: [Vertex; 3]) -> Self {
        Self { tris: [a, b], count: 2 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_slice(&self) -> &[[Vertex; 3]] {
        &self.tris[..self.count]
    }

    /// Apply `f` to every vertex of every produced triangle
    pub fn map(mut self, f: impl Fn(Vertex) -> Vertex) -> Self {
        for tri in &mut self.tris[..self.count] {
            *tri = tri.map(&f);
        }
        self
    }
}

#[inline]
fn inside(v: &Vertex, near: f32) -> bool {
    v.pos.z >= near
}

/// Point where the edge `inner -> outer` crosses the plane.
fn intersect(inner: &Vertex, outer: &Vertex, near: f32) -> Vertex {
    let t = (near - inner.pos.z) / (outer.pos.z - inner.pos.z);
    let mut v = *inner;
    v.pos = inner.pos.lerp(outer.pos, t);
    v.uv.x = inner.uv.x + t * (outer.uv.x - inner.uv.x);
    v.uv.y = inner.uv.y + t * (outer.uv.y - inner.uv.y);
    v
}

/// Clip a triangle against the near plane.
///
/// Winding order of the input is preserved in every output triangle.
pub fn clip_triangle(tri: &[Vertex; 3], near: f32) -> ClippedTriangles {
    let flags = [
        inside(&tri[0], near),
        inside(&tri[1], near),
        inside(&tri[2], near),
    ];
    let inside_count = flags.iter().filter(|&&f| f).count();

    match inside_count {
        0 => ClippedTriangles::none(),
        3 => ClippedTriangles::one(*tri),
        1 => {
            // Rotate so the inside vertex leads; cyclic order keeps winding
            let i = flags.iter().position(|&f| f).unwrap_or(0);
            let a = tri[i];
            let b = tri[(i + 1) % 3];
            let c = tri[(i + 2) % 3];
            ClippedTriangles::one([a, intersect(&a, &b, near), intersect(&a, &c, near)])
        }
        _ => {
            // Two inside: walk out -> a -> b cyclically
            let k = flags.iter().position(|&f| !f).unwrap_or(0);
            let out = tri[k];
            let a = tri[(k + 1) % 3];
            let b = tri[(k + 2) % 3];
            let pb = intersect(&b, &out, near);
            let pa = intersect(&a, &out, near);
            ClippedTriangles::two([a, b, pb], [a, pb, pa])
        }
    }
}

/// Clip a line segment against the near plane. `None` when fully behind.
pub fn clip_line(a: &Vertex, b: &Vertex, near: f32) -> Option<(Vertex, Vertex)> {
    match (inside(a, near), inside(b, near)) {
        (false, false) => None,
        (true, true) => Some((*a, *b)),
        (a_in, _) => {
            let t = (near - a.pos.z) / (b.pos.z - a.pos.z);
            let hit = a.pos.lerp(b.pos, t);
            if a_in {
                Some((*a, Vertex { pos: hit, ..*b }))
            } else {
                Some((Vertex { pos: hit, ..*a }, *b))
            }
        }
    }
}

//! Flat per-triangle sun lighting
//!
//! Lighting runs once per triangle in the shared pipeline, so both backends
//! see the same factor. The model is one-sided: faces turned away from the
//! light get ambient only.

use serde::{Deserialize, Serialize};

use super::math::{Vec3, Vec4};
use super::types::Color;

/// Directional sun light
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    /// Direction towards the light; normalized on use
    pub direction: Vec3,
    /// Ambient floor (0.0-1.0)
    pub ambient: f32,
    /// Per-channel tint
    pub sun_color: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.6, 0.8, -0.3),
            ambient: 0.15,
            sun_color: Vec3::new(1.0, 0.95, 0.8),
        }
    }
}

/// Face normal from world-space positions
pub fn face_normal(p0: Vec4, p1: Vec4, p2: Vec4) -> Vec3 {
    let edge1 = p1.xyz() - p0.xyz();
    let edge2 = p2.xyz() - p0.xyz();
    edge1.cross(edge2).normalize()
}

/// `ambient + (1 - ambient) * max(0, N.L)`, clamped to 1
pub fn lighting_factor(normal: Vec3, light: &Light) -> f32 {
    let diffuse = normal.dot(light.direction.normalize()).max(0.0);
    (light.ambient + (1.0 - light.ambient) * diffuse).min(1.0)
}

/// Scale each channel by `factor * tint`, saturating at 255. Alpha is kept.
///
/// Channels round to nearest so a factor one ulp below 1.0 keeps full color.
pub fn apply_lighting(color: u32, factor: f32, tint: Vec3) -> u32 {
    let c = Color::from_argb(color);
    let scale = |ch: u8, t: f32| -> u8 { (ch as f32 * factor * t).round().clamp(0.0, 255.0) as u8 };
    Color::with_alpha(scale(c.r, tint.x), scale(c.g, tint.y), scale(c.b, tint.z), c.a).to_argb()
}

/// Color a triangle carries into the rasterizer.
///
/// Untextured triangles are lit here. Textured ones carry the factor as an
/// opaque gray that [`modulate_texel`] applies at sample time.
pub fn lit_vertex_color(color: u32, factor: f32, textured: bool, tint: Vec3) -> u32 {
    if textured {
        Color::gray(factor).to_argb()
    } else {
        apply_lighting(color, factor, tint)
    }
}

/// Multiply a sampled texel by the gray lighting word and the sun tint
pub fn modulate_texel(texel: u32, gray: u32, tint: Vec3) -> u32 {
    let factor = Color::from_argb(gray).r as f32 / 255.0;
    apply_lighting(texel, factor, tint)
}

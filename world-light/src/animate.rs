use nalgebra_glm::{distance, vec3, Vec3};

use crate::geometry::{VertexFlags, WorldVertex};

/// Distance inside a light's radius where its contribution reaches zero.
pub const DLIGHT_CUTOFF: f32 = 64.0;

const WARP_AMPLITUDE: f32 = 0.0625;
const WARP_PHASE: f32 = 4.0;
const SCROLL_SPEED: f32 = 1.6;
const SCROLL_SPEED_WARP: f32 = 0.5;
const MAX_LIGHT: f32 = 8.0;

/// A transient point light contributing to vertex colors this frame.
#[derive(Clone, Copy, Debug)]
pub struct DynamicLight {
    pub origin: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
}

/// Sums the falloff-weighted contribution of every light at `point` onto
/// `light`.
pub fn add_dynamic_lights(point: &Vec3, lights: &[DynamicLight], light: &mut Vec3) {
    for dl in lights {
        let falloff = dl.radius - DLIGHT_CUTOFF - distance(&dl.origin, point);
        if falloff > 0.0 {
            *light += dl.color * (falloff * (1.0 / 255.0) * dl.intensity);
        }
    }
}

fn clamp_light(light: &mut Vec3) {
    light.x = light.x.clamp(0.0, MAX_LIGHT);
    light.y = light.y.clamp(0.0, MAX_LIGHT);
    light.z = light.z.clamp(0.0, MAX_LIGHT);
}

fn color_from_light(light: &Vec3, alpha: u8) -> [u8; 4] {
    let channel = |c: f32| ((c * 255.0 + 0.5) as i32).clamp(0, 255) as u8;
    [channel(light.x), channel(light.y), channel(light.z), alpha]
}

/// Per-frame rewrite of the animated vertex fields (`uv`, `color`) in place.
/// Scroll and warp always recompute from `base_uv` rather than integrating,
/// so long sessions never drift. The array is never resized.
pub struct VertexAnimator {
    has_warp: bool,
    dynamic_dirty: bool,
}

impl VertexAnimator {
    pub fn new(vertices: &[WorldVertex]) -> Self {
        Self {
            has_warp: vertices
                .iter()
                .any(|v| v.vertex_flags().contains(VertexFlags::WARP)),
            dynamic_dirty: false,
        }
    }

    /// Returns true when any vertex may have been rewritten and the vertex
    /// buffer needs re-uploading. Once warp animation and dynamic lights are
    /// both absent, one final pass restores base UVs and colors and further
    /// calls become no-ops.
    pub fn update(
        &mut self,
        vertices: &mut [WorldVertex],
        time: f32,
        lights: &[DynamicLight],
    ) -> bool {
        let animate_warp = self.has_warp;
        let has_lights = !lights.is_empty();
        if !animate_warp && !has_lights && !self.dynamic_dirty {
            return false;
        }

        for vertex in vertices.iter_mut() {
            let flags = vertex.vertex_flags();

            let mut base_u = vertex.base_uv[0];
            let base_v = vertex.base_uv[1];
            if flags.contains(VertexFlags::FLOWING) {
                let speed = if flags.contains(VertexFlags::WARP) {
                    SCROLL_SPEED_WARP
                } else {
                    SCROLL_SPEED
                };
                base_u += -speed * time;
            }

            if flags.contains(VertexFlags::WARP) && animate_warp {
                vertex.uv[0] = base_u + WARP_AMPLITUDE * (base_v * WARP_PHASE + time).sin();
                vertex.uv[1] = base_v + WARP_AMPLITUDE * (base_u * WARP_PHASE + time).sin();
            } else if self.dynamic_dirty
                || !animate_warp
                || flags.contains(VertexFlags::FLOWING)
            {
                vertex.uv = [base_u, base_v];
            }

            if has_lights {
                vertex.color = if flags.contains(VertexFlags::FULLBRIGHT) {
                    [255, 255, 255, vertex.base_alpha]
                } else {
                    let mut light = vec3(1.0, 1.0, 1.0);
                    add_dynamic_lights(&vec3(vertex.pos[0], vertex.pos[1], vertex.pos[2]), lights, &mut light);
                    clamp_light(&mut light);
                    color_from_light(&light, vertex.base_alpha)
                };
            } else if self.dynamic_dirty {
                vertex.color = [255, 255, 255, vertex.base_alpha];
            }
        }

        self.dynamic_dirty = has_lights || animate_warp;
        true
    }
}

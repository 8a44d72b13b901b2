use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use log::{debug, warn};
use nalgebra_glm::{dot, Vec3};

use crate::batch::{Batch, BatchBuilder, BatchFlags};
use crate::error::BuildError;
use crate::face::{Level, SurfaceFlags};
use crate::lightmap::LightAtlas;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VertexFlags: u8 {
        const WARP = 1 << 0;
        const FULLBRIGHT = 1 << 1;
        const ALPHA_TEST = 1 << 2;
        const FLOWING = 1 << 3;
    }
}

/// One world vertex as the GPU sees it. `uv` and `color` are rewritten by the
/// per-frame animation pass; `base_uv` and `base_alpha` keep the undistorted
/// originals so animation never drifts.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct WorldVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    pub lm_uv: [f32; 2],
    pub color: [u8; 4],
    pub base_uv: [f32; 2],
    pub base_alpha: u8,
    pub flags: u8,
    pub reserved: [u8; 2],
}

impl WorldVertex {
    pub fn vertex_flags(&self) -> VertexFlags {
        VertexFlags::from_bits_truncate(self.flags)
    }
}

/// The static level mesh: one flat vertex array in face order plus the batch
/// list partitioning it. Built once per level; only the animated vertex
/// fields ever change afterwards, never the length.
pub struct WorldMesh {
    pub vertices: Vec<WorldVertex>,
    pub batches: Vec<Batch>,
}

impl WorldMesh {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Fan-triangulates every drawable face, projecting texture UVs through the
/// face's texture axes and lightmap UVs into its atlas block.
pub fn build_mesh(level: &Level, atlas: &LightAtlas) -> Result<WorldMesh, BuildError> {
    let atlas_size = atlas.size() as f32;
    let fallback_lm = [0.5 / atlas_size, 0.5 / atlas_size];

    let mut emit = vec![false; level.faces.len()];
    let mut triangles: u64 = 0;
    for (index, face) in level.faces.iter().enumerate() {
        if !face.is_drawable() {
            continue;
        }
        if face
            .vertex_indices
            .iter()
            .any(|&i| i as usize >= level.positions.len())
        {
            warn!("face {index}: vertex index out of range, skipping");
            continue;
        }
        emit[index] = true;
        triangles += face.vertex_indices.len() as u64 - 2;
    }

    if triangles > u32::MAX as u64 / 3 {
        return Err(BuildError::VertexCountOverflow { triangles });
    }

    let mut vertices = Vec::with_capacity(triangles as usize * 3);
    let mut batches = BatchBuilder::new();

    for (index, face) in level.faces.iter().enumerate() {
        if !emit[index] {
            continue;
        }

        let surf = face.flags;
        let mut batch_flags = BatchFlags::empty();
        let mut flags = VertexFlags::empty();

        if surf.contains(SurfaceFlags::SKY) {
            batch_flags |= BatchFlags::SKY;
            flags |= VertexFlags::FULLBRIGHT;
        }
        if surf.contains(SurfaceFlags::WARP) {
            flags |= VertexFlags::WARP;
        }
        if surf.contains(SurfaceFlags::ALPHA_TEST) {
            flags |= VertexFlags::ALPHA_TEST;
        }
        if surf.contains(SurfaceFlags::FLOWING) {
            flags |= VertexFlags::FLOWING;
        }
        if surf.intersects(SurfaceFlags::TRANS33 | SurfaceFlags::TRANS66) {
            batch_flags |= BatchFlags::ALPHA;
        }

        let base_alpha = face.base_alpha();
        let color = [255, 255, 255, base_alpha];
        let inv_tex = [
            1.0 / face.texture.width.max(1) as f32,
            1.0 / face.texture.height.max(1) as f32,
        ];

        let block = atlas.blocks()[index];
        let use_lightmap = block.has_lightmap && !batch_flags.contains(BatchFlags::SKY);

        let emit_vertex = |point: Vec3| {
            let u = (dot(&point, &face.tex_axis[0]) + face.tex_offset[0]) * inv_tex[0];
            let v = (dot(&point, &face.tex_axis[1]) + face.tex_offset[1]) * inv_tex[1];
            let lm_uv = if use_lightmap {
                let s = (dot(&point, &face.lm_axis[0]) + face.lm_offset[0])
                    .clamp(0.0, (block.width - 1) as f32);
                let t = (dot(&point, &face.lm_axis[1]) + face.lm_offset[1])
                    .clamp(0.0, (block.height - 1) as f32);
                // Half-texel offset to sample texel centers.
                [
                    (block.x as f32 + s + 0.5) / atlas_size,
                    (block.y as f32 + t + 0.5) / atlas_size,
                ]
            } else {
                fallback_lm
            };
            WorldVertex {
                pos: [point.x, point.y, point.z],
                uv: [u, v],
                lm_uv,
                color,
                base_uv: [u, v],
                base_alpha,
                flags: flags.bits(),
                reserved: [0; 2],
            }
        };

        let first = level.positions[face.vertex_indices[0] as usize];
        for j in 1..face.vertex_indices.len() - 1 {
            batches.push_triangle(vertices.len() as u32, face.texture, batch_flags);
            vertices.push(emit_vertex(first));
            vertices.push(emit_vertex(level.positions[face.vertex_indices[j] as usize]));
            vertices.push(emit_vertex(
                level.positions[face.vertex_indices[j + 1] as usize],
            ));
        }
    }

    let batches = batches.finish();
    debug!(
        "world mesh: vertices={} batches={}",
        vertices.len(),
        batches.len()
    );
    Ok(WorldMesh { vertices, batches })
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use approx::assert_abs_diff_eq;
    use nalgebra_glm::vec3;

    use crate::face::{Face, Level, SurfaceFlags, TextureRef, MAX_FACE_STYLES, STYLE_UNUSED};
    use crate::lightmap::LightAtlas;
    use crate::style::StyleTable;

    use super::{build_mesh, VertexFlags, WorldVertex};

    fn square_face(flags: SurfaceFlags, lit: bool) -> Face {
        let mut styles = [STYLE_UNUSED; MAX_FACE_STYLES];
        let mut samples = Vec::new();
        if lit {
            styles[0] = 0;
            samples = vec![128; 4 * 4 * 3];
        }
        Face {
            vertex_indices: vec![0, 1, 2, 3],
            texture: TextureRef {
                id: 1,
                width: 64,
                height: 64,
            },
            tex_axis: [vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)],
            tex_offset: [0.0, 0.0],
            // 32 world units map onto the 4-texel block, so corner samples
            // clamp to the last texel row/column.
            lm_axis: [vec3(0.125, 0.0, 0.0), vec3(0.0, 0.125, 0.0)],
            lm_offset: [0.0, 0.0],
            lm_width: if lit { 4 } else { 0 },
            lm_height: if lit { 4 } else { 0 },
            styles,
            samples,
            flags,
        }
    }

    fn square_level(faces: Vec<Face>) -> Level {
        Level {
            positions: vec![
                vec3(0.0, 0.0, 0.0),
                vec3(32.0, 0.0, 0.0),
                vec3(32.0, 32.0, 0.0),
                vec3(0.0, 32.0, 0.0),
            ],
            faces,
        }
    }

    fn build(level: &Level) -> (LightAtlas, super::WorldMesh) {
        let atlas =
            LightAtlas::build_with_candidates(level, &StyleTable::default(), &[32]).unwrap();
        let mesh = build_mesh(level, &atlas).unwrap();
        (atlas, mesh)
    }

    #[test]
    fn vertex_layout_is_stable() {
        assert_eq!(size_of::<WorldVertex>(), 44);
    }

    #[test]
    fn quads_fan_into_two_triangles_in_one_batch() {
        let level = square_level(vec![square_face(SurfaceFlags::empty(), true)]);
        let (_, mesh) = build(&level);

        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.batches.len(), 1);
        assert_eq!(mesh.batches[0].first_vertex, 0);
        assert_eq!(mesh.batches[0].vertex_count, 6);

        // Fan anchored at vertex 0: (0,1,2) then (0,2,3).
        assert_eq!(mesh.vertices[0].pos, mesh.vertices[3].pos);
        assert_eq!(mesh.vertices[2].pos, mesh.vertices[4].pos);
        assert_eq!(mesh.vertices[5].pos, [0.0, 32.0, 0.0]);
    }

    #[test]
    fn texture_uvs_project_through_the_face_axes() {
        let level = square_level(vec![square_face(SurfaceFlags::empty(), true)]);
        let (_, mesh) = build(&level);

        // 32 world units over a 64-pixel texture.
        assert_abs_diff_eq!(mesh.vertices[0].uv[0], 0.0);
        assert_abs_diff_eq!(mesh.vertices[1].uv[0], 0.5);
        assert_abs_diff_eq!(mesh.vertices[1].uv[1], 0.0);
        assert_abs_diff_eq!(mesh.vertices[2].uv[1], 0.5);

        for vertex in &mesh.vertices {
            assert_eq!(vertex.uv, vertex.base_uv);
            assert_eq!(vertex.base_alpha, 255);
        }
    }

    #[test]
    fn lightmap_uvs_stay_inside_the_face_block() {
        let level = square_level(vec![square_face(SurfaceFlags::empty(), true)]);
        let (atlas, mesh) = build(&level);

        let block = atlas.blocks()[0];
        let size = atlas.size() as f32;
        let min = [block.x as f32 / size, block.y as f32 / size];
        let max = [
            (block.x + block.width) as f32 / size,
            (block.y + block.height) as f32 / size,
        ];
        for vertex in &mesh.vertices {
            assert!(vertex.lm_uv[0] >= min[0] && vertex.lm_uv[0] <= max[0]);
            assert!(vertex.lm_uv[1] >= min[1] && vertex.lm_uv[1] <= max[1]);
        }

        // Anchor vertex sits on the first texel center.
        assert_abs_diff_eq!(mesh.vertices[0].lm_uv[0], (block.x as f32 + 0.5) / size);
        // The far corner clamps to the last texel center.
        assert_abs_diff_eq!(mesh.vertices[2].lm_uv[0], (block.x as f32 + 3.5) / size);
    }

    #[test]
    fn unlit_faces_sample_the_fullbright_texel() {
        let level = square_level(vec![square_face(SurfaceFlags::empty(), false)]);
        let (atlas, mesh) = build(&level);

        let expected = 0.5 / atlas.size() as f32;
        for vertex in &mesh.vertices {
            assert_eq!(vertex.lm_uv, [expected, expected]);
        }
    }

    #[test]
    fn sky_faces_are_fullbright_and_batched_apart() {
        let level = square_level(vec![
            square_face(SurfaceFlags::empty(), true),
            square_face(SurfaceFlags::SKY, true),
        ]);
        let (atlas, mesh) = build(&level);

        assert_eq!(mesh.batches.len(), 2);
        assert!(mesh.batches[1]
            .flags
            .contains(crate::batch::BatchFlags::SKY));

        let expected = 0.5 / atlas.size() as f32;
        for vertex in &mesh.vertices[6..] {
            assert!(vertex.vertex_flags().contains(VertexFlags::FULLBRIGHT));
            assert_eq!(vertex.lm_uv, [expected, expected]);
        }
    }

    #[test]
    fn translucent_faces_carry_alpha_in_color_and_batch_state() {
        let level = square_level(vec![square_face(SurfaceFlags::TRANS33, true)]);
        let (_, mesh) = build(&level);

        assert!(mesh.batches[0]
            .flags
            .contains(crate::batch::BatchFlags::ALPHA));
        for vertex in &mesh.vertices {
            assert_eq!(vertex.color, [255, 255, 255, 84]);
            assert_eq!(vertex.base_alpha, 84);
        }
    }

    #[test]
    fn surface_flags_map_onto_vertex_flags() {
        let level = square_level(vec![square_face(
            SurfaceFlags::WARP | SurfaceFlags::FLOWING | SurfaceFlags::ALPHA_TEST,
            true,
        )]);
        let (_, mesh) = build(&level);

        let flags = mesh.vertices[0].vertex_flags();
        assert!(flags.contains(VertexFlags::WARP));
        assert!(flags.contains(VertexFlags::FLOWING));
        assert!(flags.contains(VertexFlags::ALPHA_TEST));
        assert!(!flags.contains(VertexFlags::FULLBRIGHT));
    }

    #[test]
    fn broken_vertex_indices_skip_the_face_only() {
        let mut broken = square_face(SurfaceFlags::empty(), true);
        broken.vertex_indices = vec![0, 1, 99];
        let level = square_level(vec![broken, square_face(SurfaceFlags::empty(), true)]);
        let (_, mesh) = build(&level);

        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.batches.len(), 1);
    }
}

use nalgebra_glm::{dot, vec3, Vec3};

use crate::face::{Face, STYLE_UNUSED};
use crate::style::StyleTable;

fn page_texel(page: &[u8], width: usize, s: usize, t: usize) -> Vec3 {
    let offset = 3 * (t * width + s);
    vec3(
        page[offset] as f32,
        page[offset + 1] as f32,
        page[offset + 2] as f32,
    )
}

/// Bilinearly samples a face's raw style pages at lightmap-space `(s, t)`,
/// weighted by the current intensities. Returns `None` when the face has no
/// usable lightmap or the point falls outside the block. The result is on the
/// same scale as the compositor's accumulator (1.0 is the level author's
/// reference lighting), unclamped.
pub fn sample_face_light(face: &Face, s: f32, t: f32, styles: &StyleTable) -> Option<Vec3> {
    if !face.has_light_samples() {
        return None;
    }

    let smax = face.lm_width as usize;
    let tmax = face.lm_height as usize;
    if s < 0.0 || t < 0.0 || s > (smax - 1) as f32 || t > (tmax - 1) as f32 {
        return None;
    }

    let mut light = vec3(0.0, 0.0, 0.0);

    if smax < 2 || tmax < 2 {
        // Too thin to interpolate; the first texel stands in for the block.
        for (slot, &style) in face.styles.iter().enumerate() {
            if style == STYLE_UNUSED {
                break;
            }
            light += page_texel(face.style_page(slot), smax, 0, 0) * styles.white(style);
        }
        return Some(light * (1.0 / 255.0));
    }

    let si = (s as usize).min(smax - 2);
    let ti = (t as usize).min(tmax - 2);
    let frac_u = s - si as f32;
    let frac_v = t - ti as f32;

    let w1 = (1.0 - frac_u) * (1.0 - frac_v);
    let w2 = frac_u * (1.0 - frac_v);
    let w3 = frac_u * frac_v;
    let w4 = (1.0 - frac_u) * frac_v;

    for (slot, &style) in face.styles.iter().enumerate() {
        if style == STYLE_UNUSED {
            break;
        }

        let page = face.style_page(slot);
        let blended = page_texel(page, smax, si, ti) * w1
            + page_texel(page, smax, si + 1, ti) * w2
            + page_texel(page, smax, si + 1, ti + 1) * w3
            + page_texel(page, smax, si, ti + 1) * w4;
        light += blended * styles.white(style);
    }

    Some(light * (1.0 / 255.0))
}

/// Projects a world-space point through the face's lightmap axes and samples
/// there. Callers use this for entity lighting at arbitrary surface points.
pub fn sample_point_light(face: &Face, point: &Vec3, styles: &StyleTable) -> Option<Vec3> {
    let s = dot(&face.lm_axis[0], point) + face.lm_offset[0];
    let t = dot(&face.lm_axis[1], point) + face.lm_offset[1];
    sample_face_light(face, s, t, styles)
}

use crate::face::{Face, STYLE_UNUSED};
use crate::lightmap::AtlasBlock;
use crate::style::StyleTable;

// Accumulated light is clamped here before 8-bit conversion; values above
// 1.0 are legitimate over-bright.
const MAX_LIGHT: f32 = 8.0;

fn copy_texel(rgba: &mut [u8], atlas_size: usize, dst: (usize, usize), src: (usize, usize)) {
    let src_offset = 4 * (src.1 * atlas_size + src.0);
    let dst_offset = 4 * (dst.1 * atlas_size + dst.0);
    rgba.copy_within(src_offset..src_offset + 4, dst_offset);
}

/// Rewrites one face's block inside the atlas image: sums the face's raw
/// style pages weighted by the current intensities, converts to RGBA8, then
/// replicates the interior edge one texel outward so bilinear filtering never
/// reads a neighboring block.
pub fn composite_face(
    face: &Face,
    block: &AtlasBlock,
    styles: &StyleTable,
    atlas_size: usize,
    rgba: &mut [u8],
) {
    if !block.has_lightmap || !face.has_light_samples() {
        return;
    }
    if block.x < 1
        || block.y < 1
        || block.width != face.lm_width
        || block.height != face.lm_height
    {
        return;
    }

    let w = block.width as usize;
    let h = block.height as usize;
    // Border ring origin; the interior starts one texel in.
    let x = block.x as usize - 1;
    let y = block.y as usize - 1;

    let page_bytes = face.sample_page_len();
    for ty in 0..h {
        for tx in 0..w {
            let mut light = [0.0f32; 3];
            let texel = 3 * (ty * w + tx);

            for (slot, &style) in face.styles.iter().enumerate() {
                if style == STYLE_UNUSED {
                    break;
                }

                let white = styles.white(style);
                let page = &face.samples[slot * page_bytes..];
                light[0] += white * page[texel] as f32;
                light[1] += white * page[texel + 1] as f32;
                light[2] += white * page[texel + 2] as f32;
            }

            let dst = 4 * ((y + 1 + ty) * atlas_size + x + 1 + tx);
            for channel in 0..3 {
                let scaled = (light[channel] / 255.0).clamp(0.0, MAX_LIGHT);
                rgba[dst + channel] = (scaled * 255.0 + 0.5).min(255.0) as u8;
            }
            rgba[dst + 3] = 255;
        }
    }

    for tx in 0..w {
        copy_texel(rgba, atlas_size, (x + 1 + tx, y), (x + 1 + tx, y + 1));
        copy_texel(rgba, atlas_size, (x + 1 + tx, y + h + 1), (x + 1 + tx, y + h));
    }
    for ty in 0..h {
        copy_texel(rgba, atlas_size, (x, y + 1 + ty), (x + 1, y + 1 + ty));
        copy_texel(rgba, atlas_size, (x + w + 1, y + 1 + ty), (x + w, y + 1 + ty));
    }
    copy_texel(rgba, atlas_size, (x, y), (x + 1, y + 1));
    copy_texel(rgba, atlas_size, (x + w + 1, y), (x + w, y + 1));
    copy_texel(rgba, atlas_size, (x, y + h + 1), (x + 1, y + h));
    copy_texel(rgba, atlas_size, (x + w + 1, y + h + 1), (x + w, y + h));
}

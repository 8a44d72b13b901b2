use bitflags::bitflags;
use nalgebra_glm::Vec3;

pub const MAX_LIGHT_STYLES: usize = 256;
pub const MAX_FACE_STYLES: usize = 4;
pub const STYLE_UNUSED: u8 = 255;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SurfaceFlags: u32 {
        const SKY = 1 << 0;
        const WARP = 1 << 1;
        const FLOWING = 1 << 2;
        const ALPHA_TEST = 1 << 3;
        const TRANS33 = 1 << 4;
        const TRANS66 = 1 << 5;
        const NO_DRAW = 1 << 6;
    }
}

/// Identity plus pixel size of a base texture, so UV scaling never has to
/// round-trip through the texture store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

/// One convex planar polygon of the level geometry. Read-only after level
/// load; `samples` holds one `lm_width * lm_height * 3` RGB page per used
/// style slot, consecutively.
#[derive(Clone, Debug)]
pub struct Face {
    pub vertex_indices: Vec<u32>,
    pub texture: TextureRef,
    pub tex_axis: [Vec3; 2],
    pub tex_offset: [f32; 2],
    pub lm_axis: [Vec3; 2],
    pub lm_offset: [f32; 2],
    pub lm_width: u16,
    pub lm_height: u16,
    pub styles: [u8; MAX_FACE_STYLES],
    pub samples: Vec<u8>,
    pub flags: SurfaceFlags,
}

impl Face {
    pub fn is_drawable(&self) -> bool {
        self.vertex_indices.len() >= 3 && !self.flags.contains(SurfaceFlags::NO_DRAW)
    }

    /// Used style slots, counting up to the first unused marker.
    pub fn style_count(&self) -> usize {
        self.styles
            .iter()
            .position(|&style| style == STYLE_UNUSED)
            .unwrap_or(MAX_FACE_STYLES)
    }

    pub fn sample_page_len(&self) -> usize {
        self.lm_width as usize * self.lm_height as usize * 3
    }

    pub fn style_page(&self, slot: usize) -> &[u8] {
        let page = self.sample_page_len();
        &self.samples[slot * page..(slot + 1) * page]
    }

    /// Whether this face carries a usable lightmap block. Degenerate blocks
    /// (zero dimensions, truncated sample data) are the malformed-face case
    /// and are skipped by the atlas builder.
    pub fn has_light_samples(&self) -> bool {
        self.style_count() > 0
            && self.lm_width >= 1
            && self.lm_height >= 1
            && self.samples.len() >= self.style_count() * self.sample_page_len()
    }

    pub fn base_alpha(&self) -> u8 {
        if self.flags.contains(SurfaceFlags::TRANS33) {
            (0.33f32 * 255.0 + 0.5) as u8
        } else if self.flags.contains(SurfaceFlags::TRANS66) {
            (0.66f32 * 255.0 + 0.5) as u8
        } else {
            255
        }
    }
}

/// Level geometry as handed over by the loader: a shared position pool and
/// the faces indexing into it. Immutable for the lifetime of anything built
/// from it.
pub struct Level {
    pub positions: Vec<Vec3>,
    pub faces: Vec<Face>,
}

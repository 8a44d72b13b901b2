use atlas_packer::ColumnPacker;
use log::{debug, warn};

use crate::compose::composite_face;
use crate::error::BuildError;
use crate::face::{Face, Level, STYLE_UNUSED};
use crate::store::TextureStore;
use crate::style::{StyleSet, StyleTable, StyleTracker};

/// Ascending atlas sizes tried in order. Tunable; production content has
/// never been observed to need more than the last entry.
pub const ATLAS_CANDIDATE_SIZES: [usize; 3] = [1024, 2048, 4096];

/// One face's placement inside the atlas. `(x, y)` is the interior origin;
/// the replicated border ring sits at `x - 1 .. x + width + 1`. Faces without
/// a lightmap sample the reserved fullbright texel at the atlas origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AtlasBlock {
    pub has_lightmap: bool,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Bounding box of atlas texels rewritten by a relight pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn face_uses_changed_style(face: &Face, changed: &StyleSet) -> bool {
    for &style in &face.styles {
        if style == STYLE_UNUSED {
            break;
        }
        if changed.contains(style) {
            return true;
        }
    }
    false
}

/// The packed lightmap atlas: placement table plus the canonical RGBA8 image
/// that region uploads are cut from.
#[derive(Debug)]
pub struct LightAtlas {
    size: usize,
    pixels: Vec<u8>,
    blocks: Vec<AtlasBlock>,
}

impl LightAtlas {
    pub fn build(level: &Level, styles: &StyleTable) -> Result<Self, BuildError> {
        Self::build_with_candidates(level, styles, &ATLAS_CANDIDATE_SIZES)
    }

    /// Packs every eligible face into the smallest candidate size that fits,
    /// then composites the full image with the given intensities. Candidate
    /// sizes must be ascending.
    pub fn build_with_candidates(
        level: &Level,
        styles: &StyleTable,
        candidates: &[usize],
    ) -> Result<Self, BuildError> {
        let mut eligible = vec![false; level.faces.len()];
        let mut eligible_count = 0;
        for (index, face) in level.faces.iter().enumerate() {
            if !face.is_drawable() || face.style_count() == 0 {
                continue;
            }
            if !face.has_light_samples() {
                warn!(
                    "face {index}: degenerate {}x{} lightmap block, treating as unlit",
                    face.lm_width, face.lm_height
                );
                continue;
            }
            eligible[index] = true;
            eligible_count += 1;
        }

        for &size in candidates {
            let mut packer = ColumnPacker::new(size);
            // (0, 0) stays a fullbright texel for faces without lightmaps.
            packer.reserve(0, 1, 1);

            let mut blocks = vec![AtlasBlock::default(); level.faces.len()];
            let mut packed = true;
            for (index, face) in level.faces.iter().enumerate() {
                if !eligible[index] {
                    continue;
                }

                let w = face.lm_width as usize;
                let h = face.lm_height as usize;
                match packer.allocate(w + 2, h + 2) {
                    Some((x, y)) => {
                        blocks[index] = AtlasBlock {
                            has_lightmap: true,
                            x: (x + 1) as u16,
                            y: (y + 1) as u16,
                            width: w as u16,
                            height: h as u16,
                        };
                    }
                    None => {
                        packed = false;
                        break;
                    }
                }
            }

            if !packed {
                continue;
            }

            // White and opaque everywhere, so the reserved texel and every
            // border texel a sampler can reach is valid from the start.
            let mut pixels = vec![255u8; size * size * 4];
            for (face, block) in level.faces.iter().zip(&blocks) {
                composite_face(face, block, styles, size, &mut pixels);
            }

            debug!("lightmap atlas: size={size} blocks={eligible_count}");
            return Ok(Self {
                size,
                pixels,
                blocks,
            });
        }

        Err(BuildError::PackingExhausted {
            blocks: eligible_count,
            largest: candidates.last().copied().unwrap_or(0),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn blocks(&self) -> &[AtlasBlock] {
        &self.blocks
    }

    /// Recomposites every face that references a changed style and returns
    /// the bounding rectangle of rewritten texels, border rings included.
    /// `None` means no texel moved and no upload is needed. The rectangle is
    /// recomputed from scratch on every call, never carried across frames.
    pub fn relight(
        &mut self,
        level: &Level,
        changed: &StyleSet,
        styles: &StyleTable,
    ) -> Option<DirtyRect> {
        if changed.is_empty() {
            return None;
        }

        let mut min_x = self.size;
        let mut min_y = self.size;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut faces = 0;

        for (face, block) in level.faces.iter().zip(&self.blocks) {
            if !block.has_lightmap || !face_uses_changed_style(face, changed) {
                continue;
            }

            composite_face(face, block, styles, self.size, &mut self.pixels);

            let x = block.x as usize - 1;
            let y = block.y as usize - 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x + block.width as usize + 2);
            max_y = max_y.max(y + block.height as usize + 2);
            faces += 1;
        }

        if faces == 0 {
            debug!(
                "relight: {} styles changed, no faces reference them",
                changed.len()
            );
            return None;
        }

        let max_x = max_x.min(self.size);
        let max_y = max_y.min(self.size);
        debug!(
            "relight: styles={} faces={} rect={}x{}@{},{}",
            changed.len(),
            faces,
            max_x - min_x,
            max_y - min_y,
            min_x,
            min_y
        );
        Some(DirtyRect {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        })
    }

    /// Copies a rectangle out of the atlas image into a tightly packed row
    /// buffer suitable for a region upload.
    pub fn copy_rect(&self, rect: DirtyRect) -> Vec<u8> {
        let width = rect.width as usize;
        let mut out = Vec::with_capacity(width * rect.height as usize * 4);
        for row in 0..rect.height as usize {
            let start = 4 * ((rect.y as usize + row) * self.size + rect.x as usize);
            out.extend_from_slice(&self.pixels[start..start + 4 * width]);
        }
        out
    }
}

/// Caller-owned driver tying the atlas to a style tracker: build once per
/// level, then `update` once per frame before draw submission.
pub struct WorldLighting {
    atlas: LightAtlas,
    tracker: StyleTracker,
}

impl WorldLighting {
    pub fn build(level: &Level, styles: &StyleTable) -> Result<Self, BuildError> {
        Self::build_with_candidates(level, styles, &ATLAS_CANDIDATE_SIZES)
    }

    pub fn build_with_candidates(
        level: &Level,
        styles: &StyleTable,
        candidates: &[usize],
    ) -> Result<Self, BuildError> {
        Ok(Self {
            atlas: LightAtlas::build_with_candidates(level, styles, candidates)?,
            tracker: StyleTracker::new(),
        })
    }

    pub fn atlas(&self) -> &LightAtlas {
        &self.atlas
    }

    /// Uploads the full atlas image once, returning the store's handle for
    /// later region updates.
    pub fn register<S: TextureStore>(&self, store: &mut S) -> Result<S::Handle, S::Error> {
        store.upload_full(
            self.atlas.size as u32,
            self.atlas.size as u32,
            &self.atlas.pixels,
        )
    }

    /// Per-frame path: diff the style vector, recomposite the faces that
    /// changed, and upload the one dirty rectangle. Returns the rectangle
    /// that was recomposited, or `None` when the frame needed nothing.
    ///
    /// A failed region upload is non-fatal: the tracker is invalidated so the
    /// next frame recomposites and uploads everything.
    pub fn update<S: TextureStore>(
        &mut self,
        level: &Level,
        styles: &StyleTable,
        store: &mut S,
        handle: &mut S::Handle,
    ) -> Option<DirtyRect> {
        let changed = self.tracker.diff(styles);
        if changed.is_empty() {
            return None;
        }

        let rect = self.atlas.relight(level, &changed, styles)?;
        let rows = self.atlas.copy_rect(rect);
        match store.upload_region(handle, rect.x, rect.y, rect.width, rect.height, &rows) {
            Ok(()) => {
                let coverage = 100.0 * (rect.width * rect.height) as f64
                    / (self.atlas.size * self.atlas.size) as f64;
                debug!(
                    "lightmap upload: {}x{}@{},{} ({coverage:.2}% of atlas)",
                    rect.width, rect.height, rect.x, rect.y
                );
            }
            Err(err) => {
                warn!("lightmap region upload failed, rebuilding next frame: {err}");
                self.tracker.invalidate();
            }
        }
        Some(rect)
    }
}

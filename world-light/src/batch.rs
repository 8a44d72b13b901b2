use bitflags::bitflags;

use crate::face::TextureRef;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BatchFlags: u32 {
        const ALPHA = 1 << 0;
        const SKY = 1 << 1;
    }
}

/// A maximal run of consecutive triangles drawable with one texture bind and
/// one blend state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub texture: TextureRef,
    pub flags: BatchFlags,
}

/// Coalesces a face-ordered triangle stream into batches. Greedy and purely
/// consecutive: a texture that reappears later starts a fresh batch, which
/// fragments slightly but keeps the build a single pass.
#[derive(Default)]
pub struct BatchBuilder {
    batches: Vec<Batch>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_triangle(&mut self, first_vertex: u32, texture: TextureRef, flags: BatchFlags) {
        match self.batches.last_mut() {
            Some(batch) if batch.texture == texture && batch.flags == flags => {
                batch.vertex_count += 3;
            }
            _ => self.batches.push(Batch {
                first_vertex,
                vertex_count: 3,
                texture,
                flags,
            }),
        }
    }

    pub fn finish(self) -> Vec<Batch> {
        self.batches
    }
}

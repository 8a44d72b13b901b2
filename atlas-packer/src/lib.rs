#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

/// Skyline packer over a square atlas. Tracks one occupied height per pixel
/// column; blocks are placed at the lowest skyline span that fits, leftmost
/// on ties.
pub struct ColumnPacker {
    size: usize,
    heights: Vec<usize>,
}

impl ColumnPacker {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            heights: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Marks columns `x .. x + width` as occupied up to at least `height`
    /// without going through placement, e.g. for reserved texels.
    pub fn reserve(&mut self, x: usize, width: usize, height: usize) {
        for column in &mut self.heights[x..x + width] {
            if *column < height {
                *column = height;
            }
        }
    }

    /// Finds a spot for a `width x height` block, commits it, and returns its
    /// top-left corner. Returns `None` when no candidate column span leaves
    /// enough room below the atlas edge.
    pub fn allocate(&mut self, width: usize, height: usize) -> Option<(usize, usize)> {
        let last_x = self.size.checked_sub(width)?;

        let mut best = self.size;
        let mut best_x = None;
        'candidate: for x in 0..=last_x {
            let mut top = 0;
            for &column in &self.heights[x..x + width] {
                if column >= best {
                    continue 'candidate;
                }
                if column > top {
                    top = column;
                }
            }
            best = top;
            best_x = Some(x);
        }

        let x = best_x?;
        if best + height > self.size {
            return None;
        }

        for column in &mut self.heights[x..x + width] {
            *column = best + height;
        }
        Some((x, best))
    }
}

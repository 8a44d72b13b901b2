use thiserror::Error;

/// Fatal load-time failures. Per-frame problems (failed region uploads,
/// malformed faces) are logged and recovered instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no atlas candidate up to {largest}x{largest} admits all {blocks} lightmap blocks")]
    PackingExhausted { blocks: usize, largest: usize },

    #[error("world mesh needs {triangles} triangles, past the 32-bit vertex range")]
    VertexCountOverflow { triangles: u64 },
}

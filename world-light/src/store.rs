/// Boundary to the external GPU/texture layer. `upload_full` runs once when
/// an atlas is registered; `upload_region` runs at most once per frame with a
/// tightly packed row buffer for the dirty rectangle.
pub trait TextureStore {
    type Handle;
    type Error: std::error::Error;

    fn upload_full(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Self::Handle, Self::Error>;

    fn upload_region(
        &mut self,
        handle: &mut Self::Handle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), Self::Error>;
}

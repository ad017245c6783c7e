use crate::null::VelaTextureNull;
use crate::{VelaResourceId, VelaTextureDef};

/// An image on the GPU. Render targets and depth buffers are textures with matching usage flags.
///
/// Cloning is cheap and shares the underlying resource. It is destroyed once the last clone is
/// dropped, which must not happen while submitted GPU work still references it.
#[derive(Clone, Debug)]
pub enum VelaTexture {
    Null(VelaTextureNull),
}

impl VelaTexture {
    pub fn texture_def(&self) -> &VelaTextureDef {
        match self {
            VelaTexture::Null(inner) => inner.texture_def(),
        }
    }

    pub fn resource_id(&self) -> VelaResourceId {
        match self {
            VelaTexture::Null(inner) => inner.resource_id(),
        }
    }

    /// Get the underlying null texture, if this is a null texture
    pub fn null_texture(&self) -> Option<&VelaTextureNull> {
        match self {
            VelaTexture::Null(inner) => Some(inner),
        }
    }
}

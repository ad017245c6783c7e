use fnv::FnvHasher;
use std::hash::{Hash, Hasher};
use vela_api::{
    VelaBufferDef, VelaClearValue, VelaExtents2D, VelaExtents3D, VelaFormat, VelaMemoryUsage,
    VelaResourceState, VelaResourceUsage, VelaTextureDef,
};
use vela_base::Name;

/// A logical resource: a canonical name plus a subresource index (mip level, array slice)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderGraphResourceKey {
    pub name: Name,
    pub subresource: u32,
}

impl RenderGraphResourceKey {
    pub fn new(
        name: Name,
        subresource: u32,
    ) -> Self {
        RenderGraphResourceKey { name, subresource }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderGraphResourceLifetime {
    /// Contents are only meaningful within the frame. Must be written before being read.
    Transient,
    /// Contents carry over from the previous frame
    Persistent,
    /// Owned outside the graph (for example a swapchain image) and imported every frame
    External,
}

impl RenderGraphResourceLifetime {
    /// If true the resource holds valid data before any node of the frame runs, as if an
    /// implicit node at the start of the frame had written it
    pub fn has_frame_start_contents(self) -> bool {
        self != RenderGraphResourceLifetime::Transient
    }
}

/// Size of a graph texture
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderGraphExtents {
    /// Same size as the output surface. Resources with these extents are recreated on resize.
    MatchSurface,
    Custom(VelaExtents3D),
}

impl RenderGraphExtents {
    pub fn resolve(
        self,
        surface_extents: VelaExtents2D,
    ) -> VelaExtents3D {
        match self {
            RenderGraphExtents::MatchSurface => surface_extents.to_3d(),
            RenderGraphExtents::Custom(extents) => extents,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderGraphTextureDesc {
    pub format: VelaFormat,
    pub extents: RenderGraphExtents,
    pub mip_count: u32,
    pub array_length: u32,
    pub clear_value: Option<VelaClearValue>,
}

impl RenderGraphTextureDesc {
    pub fn new(format: VelaFormat) -> Self {
        RenderGraphTextureDesc {
            format,
            extents: RenderGraphExtents::MatchSurface,
            mip_count: 1,
            array_length: 1,
            clear_value: None,
        }
    }

    pub fn with_extents(
        mut self,
        extents: RenderGraphExtents,
    ) -> Self {
        self.extents = extents;
        self
    }

    pub fn with_mip_count(
        mut self,
        mip_count: u32,
    ) -> Self {
        self.mip_count = mip_count;
        self
    }

    pub fn with_clear_value(
        mut self,
        clear_value: VelaClearValue,
    ) -> Self {
        self.clear_value = Some(clear_value);
        self
    }

    pub fn subresource_count(&self) -> u32 {
        self.mip_count * self.array_length
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderGraphBufferDesc {
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderGraphResourceDesc {
    Texture(RenderGraphTextureDesc),
    Buffer(RenderGraphBufferDesc),
}

impl RenderGraphResourceDesc {
    pub fn is_texture(&self) -> bool {
        matches!(self, RenderGraphResourceDesc::Texture(_))
    }

    pub fn subresource_count(&self) -> u32 {
        match self {
            RenderGraphResourceDesc::Texture(desc) => desc.subresource_count(),
            RenderGraphResourceDesc::Buffer(_) => 1,
        }
    }
}

/// Everything the graph knows about one canonical resource after planning
#[derive(Clone, Debug)]
pub struct RenderGraphResourceInfo {
    pub name: Name,
    pub desc: RenderGraphResourceDesc,
    /// Union of the usage every declaration of this resource needs
    pub usage: VelaResourceUsage,
    pub lifetime: RenderGraphResourceLifetime,
}

impl RenderGraphResourceInfo {
    /// The physical resource definition for the current surface size
    pub fn creation_info(
        &self,
        surface_extents: VelaExtents2D,
    ) -> FrameResourceCreationInfo {
        match &self.desc {
            RenderGraphResourceDesc::Texture(desc) => {
                FrameResourceCreationInfo::Texture(VelaTextureDef {
                    extents: desc.extents.resolve(surface_extents),
                    array_length: desc.array_length,
                    mip_count: desc.mip_count,
                    format: desc.format,
                    usage: self.usage,
                    clear_value: desc.clear_value,
                })
            }
            RenderGraphResourceDesc::Buffer(desc) => {
                FrameResourceCreationInfo::Buffer(VelaBufferDef {
                    size: desc.size,
                    memory_usage: VelaMemoryUsage::GpuOnly,
                    usage: self.usage,
                })
            }
        }
    }
}

/// Canonical key a physical resource is created from. Identical configuration always produces
/// an identical key and hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameResourceCreationInfo {
    Texture(VelaTextureDef),
    Buffer(VelaBufferDef),
}

impl FrameResourceCreationInfo {
    pub fn hash_value(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub fn subresource_count(&self) -> u32 {
        match self {
            FrameResourceCreationInfo::Texture(def) => def.subresource_count(),
            FrameResourceCreationInfo::Buffer(_) => 1,
        }
    }
}

/// How a node accesses a resource. Determines the usage the resource needs and the state it
/// is transitioned to before the node records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderGraphAccess {
    RenderTarget,
    DepthWrite,
    DepthRead,
    ShaderRead,
    UnorderedAccess,
    CopySrc,
    CopyDst,
}

impl RenderGraphAccess {
    pub fn is_write(self) -> bool {
        self.resource_state().is_write()
    }

    pub fn required_usage(self) -> VelaResourceUsage {
        match self {
            RenderGraphAccess::RenderTarget => VelaResourceUsage::RENDER_TARGET,
            RenderGraphAccess::DepthWrite | RenderGraphAccess::DepthRead => {
                VelaResourceUsage::DEPTH_STENCIL
            }
            RenderGraphAccess::ShaderRead => VelaResourceUsage::SHADER_RESOURCE,
            RenderGraphAccess::UnorderedAccess => VelaResourceUsage::UNORDERED_ACCESS,
            RenderGraphAccess::CopySrc => VelaResourceUsage::COPY_SRC,
            RenderGraphAccess::CopyDst => VelaResourceUsage::COPY_DST,
        }
    }

    pub fn resource_state(self) -> VelaResourceState {
        match self {
            RenderGraphAccess::RenderTarget => VelaResourceState::RENDER_TARGET,
            RenderGraphAccess::DepthWrite => VelaResourceState::DEPTH_WRITE,
            RenderGraphAccess::DepthRead => VelaResourceState::DEPTH_READ,
            RenderGraphAccess::ShaderRead => VelaResourceState::SHADER_RESOURCE,
            RenderGraphAccess::UnorderedAccess => VelaResourceState::UNORDERED_ACCESS,
            RenderGraphAccess::CopySrc => VelaResourceState::COPY_SRC,
            RenderGraphAccess::CopyDst => VelaResourceState::COPY_DST,
        }
    }

    /// Render target and depth accesses only make sense for textures
    pub fn is_valid_for(
        self,
        desc: &RenderGraphResourceDesc,
    ) -> bool {
        match self {
            RenderGraphAccess::RenderTarget
            | RenderGraphAccess::DepthWrite
            | RenderGraphAccess::DepthRead => desc.is_texture(),
            _ => true,
        }
    }
}

/// One declared access of a node
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderGraphResourceUse {
    pub key: RenderGraphResourceKey,
    pub access: RenderGraphAccess,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_base::NameRegistry;

    #[test]
    fn test_creation_info_hash_follows_fields() {
        let mut names = NameRegistry::new();
        let info = RenderGraphResourceInfo {
            name: names.intern("ColorBuffer"),
            desc: RenderGraphResourceDesc::Texture(RenderGraphTextureDesc::new(
                VelaFormat::R16G16B16A16_SFLOAT,
            )),
            usage: VelaResourceUsage::RENDER_TARGET | VelaResourceUsage::SHADER_RESOURCE,
            lifetime: RenderGraphResourceLifetime::Transient,
        };

        let small = VelaExtents2D {
            width: 640,
            height: 480,
        };
        let large = VelaExtents2D {
            width: 1280,
            height: 720,
        };

        let a = info.creation_info(small);
        let b = info.creation_info(small);
        let c = info.creation_info(large);
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a.hash_value(), c.hash_value());
    }

    #[test]
    fn test_access_states() {
        assert!(RenderGraphAccess::RenderTarget.is_write());
        assert!(RenderGraphAccess::UnorderedAccess.is_write());
        assert!(!RenderGraphAccess::ShaderRead.is_write());
        assert!(!RenderGraphAccess::DepthRead.is_write());

        let buffer = RenderGraphResourceDesc::Buffer(RenderGraphBufferDesc { size: 64 });
        assert!(!RenderGraphAccess::RenderTarget.is_valid_for(&buffer));
        assert!(RenderGraphAccess::UnorderedAccess.is_valid_for(&buffer));
    }
}

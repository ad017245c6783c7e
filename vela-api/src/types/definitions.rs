use crate::{
    VelaClearValue, VelaDescriptorHeapType, VelaExtents3D, VelaFormat, VelaMemoryUsage,
    VelaResourceId, VelaResourceUsage, VelaResult,
};

/// Used to create a `VelaTexture`. Render targets and depth buffers are textures with the
/// matching usage flags.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaTextureDef {
    pub extents: VelaExtents3D,
    pub array_length: u32,
    pub mip_count: u32,
    pub format: VelaFormat,
    pub usage: VelaResourceUsage,
    pub clear_value: Option<VelaClearValue>,
}

impl Default for VelaTextureDef {
    fn default() -> Self {
        VelaTextureDef {
            extents: VelaExtents3D {
                width: 0,
                height: 0,
                depth: 1,
            },
            array_length: 1,
            mip_count: 1,
            format: VelaFormat::UNDEFINED,
            usage: VelaResourceUsage::SHADER_RESOURCE,
            clear_value: None,
        }
    }
}

impl VelaTextureDef {
    pub fn verify(&self) -> VelaResult<()> {
        if self.extents.width == 0 || self.extents.height == 0 || self.extents.depth == 0 {
            return Err(format!("Texture extents must be non-zero, got {:?}", self.extents))?;
        }

        if self.array_length == 0 || self.mip_count == 0 {
            Err("Texture array length and mip count must be non-zero")?;
        }

        if self.format == VelaFormat::UNDEFINED {
            Err("Texture format must not be UNDEFINED")?;
        }

        if self.usage.contains(VelaResourceUsage::DEPTH_STENCIL) && !self.format.has_depth() {
            return Err(format!(
                "Texture with DEPTH_STENCIL usage needs a depth format, got {:?}",
                self.format
            ))?;
        }

        if self.usage.contains(VelaResourceUsage::RENDER_TARGET) && self.format.has_depth() {
            return Err(format!(
                "Texture with RENDER_TARGET usage can't use depth format {:?}",
                self.format
            ))?;
        }

        Ok(())
    }

    /// Subresources are indexed `mip + array_slice * mip_count`
    pub fn subresource_count(&self) -> u32 {
        self.mip_count * self.array_length
    }
}

/// Used to create a `VelaBuffer`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaBufferDef {
    pub size: u64,
    pub memory_usage: VelaMemoryUsage,
    pub usage: VelaResourceUsage,
}

impl Default for VelaBufferDef {
    fn default() -> Self {
        VelaBufferDef {
            size: 0,
            memory_usage: VelaMemoryUsage::GpuOnly,
            usage: VelaResourceUsage::empty(),
        }
    }
}

impl VelaBufferDef {
    pub fn verify(&self) -> VelaResult<()> {
        if self.size == 0 {
            Err("Buffer size must be non-zero")?;
        }

        if self.usage.intersects(
            VelaResourceUsage::RENDER_TARGET | VelaResourceUsage::DEPTH_STENCIL,
        ) {
            Err("Buffers can't be used as render targets or depth buffers")?;
        }

        Ok(())
    }

    /// A CPU-writable buffer used as the source of copies to GPU-only resources
    pub fn for_staging_buffer(size: u64) -> VelaBufferDef {
        VelaBufferDef {
            size,
            memory_usage: VelaMemoryUsage::CpuToGpu,
            usage: VelaResourceUsage::COPY_SRC,
        }
    }
}

/// Used to create a `VelaDescriptorHeap`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaDescriptorHeapDef {
    pub heap_type: VelaDescriptorHeapType,
    pub descriptor_count: u32,
    pub shader_visible: bool,
}

impl VelaDescriptorHeapDef {
    pub fn verify(&self) -> VelaResult<()> {
        if self.descriptor_count == 0 {
            Err("Descriptor heaps must hold at least one descriptor")?;
        }

        if self.shader_visible && !self.heap_type.can_be_shader_visible() {
            return Err(format!(
                "Descriptor heaps of type {:?} can't be shader visible",
                self.heap_type
            ))?;
        }

        Ok(())
    }
}

/// The contents of one descriptor
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VelaDescriptorView {
    RenderTarget {
        resource: VelaResourceId,
        subresource: u32,
    },
    DepthStencil {
        resource: VelaResourceId,
        read_only: bool,
    },
    ShaderResource {
        resource: VelaResourceId,
    },
    UnorderedAccess {
        resource: VelaResourceId,
    },
    ConstantBuffer {
        resource: VelaResourceId,
        offset: u64,
        size: u64,
    },
}

impl VelaDescriptorView {
    /// The heap type this descriptor must be written into
    pub fn heap_type(&self) -> VelaDescriptorHeapType {
        match self {
            VelaDescriptorView::RenderTarget { .. } => VelaDescriptorHeapType::RenderTargetView,
            VelaDescriptorView::DepthStencil { .. } => VelaDescriptorHeapType::DepthStencilView,
            VelaDescriptorView::ShaderResource { .. }
            | VelaDescriptorView::UnorderedAccess { .. }
            | VelaDescriptorView::ConstantBuffer { .. } => VelaDescriptorHeapType::CbvSrvUav,
        }
    }

    pub fn resource(&self) -> VelaResourceId {
        match *self {
            VelaDescriptorView::RenderTarget { resource, .. } => resource,
            VelaDescriptorView::DepthStencil { resource, .. } => resource,
            VelaDescriptorView::ShaderResource { resource } => resource,
            VelaDescriptorView::UnorderedAccess { resource } => resource,
            VelaDescriptorView::ConstantBuffer { resource, .. } => resource,
        }
    }
}

/// Used to create a `VelaRootSignature`. Shader reflection happens outside this crate, so the
/// layout is described only by its parameter counts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct VelaRootSignatureDef {
    pub name: String,
    pub parameter_count: u32,
    pub static_sampler_count: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VelaPipelineType {
    Graphics,
    Compute,
}

/// Used to create a `VelaPipeline`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaPipelineDef {
    pub name: String,
    pub pipeline_type: VelaPipelineType,
    pub render_target_formats: Vec<VelaFormat>,
    pub depth_stencil_format: Option<VelaFormat>,
}

impl VelaPipelineDef {
    pub fn verify(&self) -> VelaResult<()> {
        if self.render_target_formats.len() > crate::MAX_RENDER_TARGET_ATTACHMENTS {
            return Err(format!(
                "Pipeline {} has {} render targets, at most {} are supported",
                self.name,
                self.render_target_formats.len(),
                crate::MAX_RENDER_TARGET_ATTACHMENTS
            ))?;
        }

        if self.pipeline_type == VelaPipelineType::Compute
            && (!self.render_target_formats.is_empty() || self.depth_stencil_format.is_some())
        {
            return Err(format!(
                "Compute pipeline {} can't have render target formats",
                self.name
            ))?;
        }

        if let Some(format) = self.depth_stencil_format {
            if !format.has_depth() {
                return Err(format!(
                    "Pipeline {} depth format {:?} has no depth",
                    self.name, format
                ))?;
            }
        }

        Ok(())
    }
}

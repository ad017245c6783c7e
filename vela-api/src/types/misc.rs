use crate::{FENCE_VALUE_COUNTER_MASK, FENCE_VALUE_TAG_SHIFT};
use std::hash::{Hash, Hasher};
use vela_base::DecimalF32;

/// Used to indicate which type of queue to use. Some operations require certain types of queues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VelaQueueType {
    /// Graphics queues generally supports all operations and are a safe default choice
    Graphics,

    /// Compute queues can be used for compute-based work.
    Compute,

    /// Transfer queues are generally limited to basic operations like copying data between
    /// resources.
    Transfer,
}

impl VelaQueueType {
    pub const ALL: [VelaQueueType; 3] = [
        VelaQueueType::Graphics,
        VelaQueueType::Compute,
        VelaQueueType::Transfer,
    ];

    pub fn index(self) -> usize {
        match self {
            VelaQueueType::Graphics => 0,
            VelaQueueType::Compute => 1,
            VelaQueueType::Transfer => 2,
        }
    }

    /// Fence values signaled by a queue of this type carry this tag in their high bits, which
    /// keeps values from different queues distinguishable.
    pub fn fence_tag(self) -> u64 {
        (self.index() as u64 + 1) << FENCE_VALUE_TAG_SHIFT
    }

    /// The queue type that signaled the given fence value, if the value is tagged
    pub fn from_fence_value(value: u64) -> Option<VelaQueueType> {
        match value >> FENCE_VALUE_TAG_SHIFT {
            1 => Some(VelaQueueType::Graphics),
            2 => Some(VelaQueueType::Compute),
            3 => Some(VelaQueueType::Transfer),
            _ => None,
        }
    }

    /// Only graphics and compute queues may record draws/dispatches
    pub fn supports_dispatch(self) -> bool {
        self != VelaQueueType::Transfer
    }
}

/// Strip the queue tag from a fence value
pub fn fence_value_counter(value: u64) -> u64 {
    value & FENCE_VALUE_COUNTER_MASK
}

bitflags::bitflags! {
    /// The current state of a resource. When an operation is performed that references a resource,
    /// it must be in the correct state. Resources are moved between state using barriers.
    pub struct VelaResourceState: u32 {
        const UNDEFINED = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const SHADER_RESOURCE = 0x40 | 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DST = 0x400;
        const COPY_SRC = 0x800;
        const GENERIC_READ = (((((0x1 | 0x2) | 0x40) | 0x80) | 0x200) | 0x800);
        const PRESENT = 0x1000;
        /// State every resource is created in
        const COMMON = 0x2000;
    }
}

impl VelaResourceState {
    /// True if a resource in this state may be written by the GPU
    pub fn is_write(self) -> bool {
        self.intersects(
            VelaResourceState::RENDER_TARGET
                | VelaResourceState::UNORDERED_ACCESS
                | VelaResourceState::DEPTH_WRITE
                | VelaResourceState::COPY_DST
                | VelaResourceState::STREAM_OUT,
        )
    }
}

bitflags::bitflags! {
    /// How a resource may be used. Determines which views can be created for it.
    pub struct VelaResourceUsage: u32 {
        const RENDER_TARGET = 1<<0;
        const DEPTH_STENCIL = 1<<1;
        const UNORDERED_ACCESS = 1<<2;
        const SHADER_RESOURCE = 1<<3;
        const COPY_SRC = 1<<4;
        const COPY_DST = 1<<5;
        const VERTEX_BUFFER = 1<<6;
        const INDEX_BUFFER = 1<<7;
        const CONSTANT_BUFFER = 1<<8;
    }
}

impl Default for VelaResourceUsage {
    fn default() -> Self {
        VelaResourceUsage::empty()
    }
}

/// Indicates how the memory will be accessed and affects where in memory it needs to be allocated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VelaMemoryUsage {
    /// The memory is only accessed by the GPU
    GpuOnly,

    /// The memory is written by the CPU and read by the GPU
    CpuToGpu,

    /// The memory is written by the GPU and read by the CPU
    GpuToCpu,
}

impl VelaMemoryUsage {
    pub fn is_cpu_visible(self) -> bool {
        self != VelaMemoryUsage::GpuOnly
    }
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VelaFormat {
    UNDEFINED,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R11G11B10_UFLOAT,
    R32_SFLOAT,
    R32_UINT,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
}

impl Default for VelaFormat {
    fn default() -> Self {
        VelaFormat::UNDEFINED
    }
}

impl VelaFormat {
    pub fn has_depth(self) -> bool {
        matches!(self, VelaFormat::D32_SFLOAT | VelaFormat::D24_UNORM_S8_UINT)
    }

    pub fn has_stencil(self) -> bool {
        self == VelaFormat::D24_UNORM_S8_UINT
    }
}

/// A 2d size for windows, textures, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaExtents2D {
    pub width: u32,
    pub height: u32,
}

impl VelaExtents2D {
    pub fn to_3d(self) -> VelaExtents3D {
        VelaExtents3D {
            width: self.width,
            height: self.height,
            depth: 1,
        }
    }
}

/// A 3d size for windows, textures, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaExtents3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// A clear value for color attachments
#[derive(Copy, Clone, Debug, Default)]
pub struct VelaColorClearValue(pub [f32; 4]);

impl Hash for VelaColorClearValue {
    fn hash<H: Hasher>(
        &self,
        mut state: &mut H,
    ) {
        for &value in &self.0 {
            DecimalF32(value).hash(&mut state);
        }
    }
}

impl PartialEq for VelaColorClearValue {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(&a, &b)| DecimalF32(a) == DecimalF32(b))
    }
}

impl Eq for VelaColorClearValue {}

/// A clear values for depth/stencil attachments. One or both values may be used depending on the
/// format of the attached image
#[derive(Clone, Copy, Debug)]
pub struct VelaDepthStencilClearValue {
    pub depth: f32,
    pub stencil: u32,
}

impl Default for VelaDepthStencilClearValue {
    fn default() -> Self {
        VelaDepthStencilClearValue {
            depth: 0.0,
            stencil: 0,
        }
    }
}

impl Hash for VelaDepthStencilClearValue {
    fn hash<H: Hasher>(
        &self,
        mut state: &mut H,
    ) {
        DecimalF32(self.depth).hash(&mut state);
        self.stencil.hash(&mut state);
    }
}

impl PartialEq for VelaDepthStencilClearValue {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        DecimalF32(self.depth) == DecimalF32(other.depth) && self.stencil == other.stencil
    }
}

impl Eq for VelaDepthStencilClearValue {}

/// Optimized clear value stored with a texture
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VelaClearValue {
    Color(VelaColorClearValue),
    DepthStencil(VelaDepthStencilClearValue),
}

/// Identifies a physical resource (texture or buffer) for as long as it is alive. Ids are never
/// reused by a device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VelaResourceId(pub u64);

impl std::fmt::Display for VelaResourceId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// A transition of one subresource from one state to another
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VelaResourceBarrier {
    pub resource: VelaResourceId,
    pub subresource: u32,
    pub state_before: VelaResourceState,
    pub state_after: VelaResourceState,
}

/// The kinds of descriptor heaps. Each heap holds one kind of descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VelaDescriptorHeapType {
    RenderTargetView,
    DepthStencilView,
    /// Constant buffer, shader resource and unordered access views
    CbvSrvUav,
    Sampler,
}

impl VelaDescriptorHeapType {
    /// Only these heap types can be bound to shaders
    pub fn can_be_shader_visible(self) -> bool {
        matches!(
            self,
            VelaDescriptorHeapType::CbvSrvUav | VelaDescriptorHeapType::Sampler
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VelaCpuDescriptorHandle(pub u64);

impl VelaCpuDescriptorHandle {
    pub fn offset(
        self,
        index: u32,
        increment_size: u32,
    ) -> VelaCpuDescriptorHandle {
        VelaCpuDescriptorHandle(self.0 + index as u64 * increment_size as u64)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VelaGpuDescriptorHandle(pub u64);

impl VelaGpuDescriptorHandle {
    pub fn offset(
        self,
        index: u32,
        increment_size: u32,
    ) -> VelaGpuDescriptorHandle {
        VelaGpuDescriptorHandle(self.0 + index as u64 * increment_size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_tags_round_trip_queue_type() {
        for &queue_type in &VelaQueueType::ALL {
            let value = queue_type.fence_tag() | 42;
            assert_eq!(VelaQueueType::from_fence_value(value), Some(queue_type));
            assert_eq!(fence_value_counter(value), 42);
        }

        assert_eq!(VelaQueueType::from_fence_value(42), None);
        assert!(VelaQueueType::Graphics.fence_tag() < VelaQueueType::Compute.fence_tag());
    }

    #[test]
    fn test_clear_values_compare_bitwise() {
        let a = VelaClearValue::Color(VelaColorClearValue([0.0, 0.0, 0.0, 1.0]));
        let b = VelaClearValue::Color(VelaColorClearValue([0.0, 0.0, 0.0, 1.0]));
        let c = VelaClearValue::DepthStencil(VelaDepthStencilClearValue {
            depth: 1.0,
            stencil: 0,
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_write_states() {
        assert!(VelaResourceState::RENDER_TARGET.is_write());
        assert!(VelaResourceState::DEPTH_WRITE.is_write());
        assert!(!VelaResourceState::SHADER_RESOURCE.is_write());
        assert!(!VelaResourceState::DEPTH_READ.is_write());
        assert!(!VelaResourceState::COMMON.is_write());
    }
}

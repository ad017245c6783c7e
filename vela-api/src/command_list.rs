use crate::null::VelaCommandListNull;
use crate::{
    VelaBuffer, VelaColorClearValue, VelaDepthStencilClearValue, VelaQueueType,
    VelaResourceBarrier, VelaResourceId, VelaResult, VelaTexture,
};

/// A recorded GPU command
#[derive(Clone, Debug)]
pub enum VelaCommand {
    ResourceBarrier(Vec<VelaResourceBarrier>),
    ClearRenderTarget {
        resource: VelaResourceId,
        color: VelaColorClearValue,
    },
    ClearDepthStencil {
        resource: VelaResourceId,
        value: VelaDepthStencilClearValue,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    Dispatch {
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    },
    CopyBuffer {
        src: VelaBuffer,
        src_offset: u64,
        dst: VelaBuffer,
        dst_offset: u64,
        size: u64,
    },
    SetMarker(String),
}

/// A list of commands for one queue type.
///
/// Lifecycle: created open, record, `close`, submit with `VelaQueue::execute_command_list`,
/// `reset` to record again. Recording into a closed list fails.
#[derive(Debug)]
pub enum VelaCommandList {
    Null(VelaCommandListNull),
}

impl VelaCommandList {
    pub fn queue_type(&self) -> VelaQueueType {
        match self {
            VelaCommandList::Null(inner) => inner.queue_type(),
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            VelaCommandList::Null(inner) => inner.is_open(),
        }
    }

    pub fn reset(&mut self) -> VelaResult<()> {
        match self {
            VelaCommandList::Null(inner) => inner.reset(),
        }
    }

    pub fn close(&mut self) -> VelaResult<()> {
        match self {
            VelaCommandList::Null(inner) => inner.close(),
        }
    }

    /// Records nothing if `barriers` is empty
    pub fn resource_barrier(
        &mut self,
        barriers: &[VelaResourceBarrier],
    ) -> VelaResult<()> {
        match self {
            VelaCommandList::Null(inner) => inner.resource_barrier(barriers),
        }
    }

    pub fn clear_render_target(
        &mut self,
        texture: &VelaTexture,
        color: VelaColorClearValue,
    ) -> VelaResult<()> {
        match (self, texture) {
            (VelaCommandList::Null(inner), VelaTexture::Null(texture)) => {
                inner.clear_render_target(texture, color)
            }
        }
    }

    pub fn clear_depth_stencil(
        &mut self,
        texture: &VelaTexture,
        value: VelaDepthStencilClearValue,
    ) -> VelaResult<()> {
        match (self, texture) {
            (VelaCommandList::Null(inner), VelaTexture::Null(texture)) => {
                inner.clear_depth_stencil(texture, value)
            }
        }
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
    ) -> VelaResult<()> {
        match self {
            VelaCommandList::Null(inner) => inner.draw(vertex_count, instance_count),
        }
    }

    pub fn dispatch(
        &mut self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> VelaResult<()> {
        match self {
            VelaCommandList::Null(inner) => {
                inner.dispatch(group_count_x, group_count_y, group_count_z)
            }
        }
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        src: &VelaBuffer,
        src_offset: u64,
        dst: &VelaBuffer,
        dst_offset: u64,
        size: u64,
    ) -> VelaResult<()> {
        match (self, src, dst) {
            (VelaCommandList::Null(inner), VelaBuffer::Null(src), VelaBuffer::Null(dst)) => {
                inner.copy_buffer_to_buffer(src, src_offset, dst, dst_offset, size)
            }
        }
    }

    pub fn set_marker(
        &mut self,
        label: &str,
    ) -> VelaResult<()> {
        match self {
            VelaCommandList::Null(inner) => inner.set_marker(label),
        }
    }

    /// Get the underlying null command list, if this is a null command list
    pub fn null_command_list(&self) -> Option<&VelaCommandListNull> {
        match self {
            VelaCommandList::Null(inner) => Some(inner),
        }
    }
}

use super::{NullGpu, VelaBufferNull, VelaTextureNull};
use crate::{
    VelaBuffer, VelaColorClearValue, VelaCommand, VelaDepthStencilClearValue, VelaQueueType,
    VelaResourceBarrier, VelaResult,
};
use std::sync::Arc;

/// Records commands into a list that is handed to a queue worker on submit
#[derive(Debug)]
pub struct VelaCommandListNull {
    queue_type: VelaQueueType,
    commands: Vec<VelaCommand>,
    is_open: bool,
    gpu: Arc<NullGpu>,
}

impl VelaCommandListNull {
    pub(crate) fn new(
        gpu: &Arc<NullGpu>,
        queue_type: VelaQueueType,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;

        Ok(VelaCommandListNull {
            queue_type,
            commands: Vec::default(),
            is_open: true,
            gpu: gpu.clone(),
        })
    }

    pub fn queue_type(&self) -> VelaQueueType {
        self.queue_type
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn commands(&self) -> &[VelaCommand] {
        &self.commands
    }

    /// Discard anything recorded and reopen the list
    pub fn reset(&mut self) -> VelaResult<()> {
        self.gpu.check_removed()?;
        self.commands.clear();
        self.is_open = true;
        Ok(())
    }

    pub fn close(&mut self) -> VelaResult<()> {
        self.gpu.check_removed()?;
        if !self.is_open {
            Err("Command list is already closed")?;
        }

        self.is_open = false;
        Ok(())
    }

    pub(crate) fn take_for_submit(&mut self) -> Vec<VelaCommand> {
        self.is_open = false;
        std::mem::take(&mut self.commands)
    }

    fn record(
        &mut self,
        command: VelaCommand,
    ) -> VelaResult<()> {
        self.gpu.check_removed()?;
        if !self.is_open {
            return Err(format!(
                "Can't record {:?} into a closed command list",
                command
            ))?;
        }

        self.commands.push(command);
        Ok(())
    }

    pub fn resource_barrier(
        &mut self,
        barriers: &[VelaResourceBarrier],
    ) -> VelaResult<()> {
        if barriers.is_empty() {
            return Ok(());
        }

        self.record(VelaCommand::ResourceBarrier(barriers.to_vec()))
    }

    pub fn clear_render_target(
        &mut self,
        texture: &VelaTextureNull,
        color: VelaColorClearValue,
    ) -> VelaResult<()> {
        self.check_graphics("clear_render_target")?;
        self.record(VelaCommand::ClearRenderTarget {
            resource: texture.resource_id(),
            color,
        })
    }

    pub fn clear_depth_stencil(
        &mut self,
        texture: &VelaTextureNull,
        value: VelaDepthStencilClearValue,
    ) -> VelaResult<()> {
        self.check_graphics("clear_depth_stencil")?;
        self.record(VelaCommand::ClearDepthStencil {
            resource: texture.resource_id(),
            value,
        })
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
    ) -> VelaResult<()> {
        self.check_graphics("draw")?;
        self.record(VelaCommand::Draw {
            vertex_count,
            instance_count,
        })
    }

    pub fn dispatch(
        &mut self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> VelaResult<()> {
        if !self.queue_type.supports_dispatch() {
            return Err(format!(
                "dispatch can't be recorded for a {:?} queue",
                self.queue_type
            ))?;
        }

        self.record(VelaCommand::Dispatch {
            group_count_x,
            group_count_y,
            group_count_z,
        })
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        src: &VelaBufferNull,
        src_offset: u64,
        dst: &VelaBufferNull,
        dst_offset: u64,
        size: u64,
    ) -> VelaResult<()> {
        if src_offset + size > src.buffer_def().size || dst_offset + size > dst.buffer_def().size {
            return Err(format!(
                "Copy of {} bytes from {}+{} to {}+{} is out of bounds",
                size,
                src.resource_id(),
                src_offset,
                dst.resource_id(),
                dst_offset
            ))?;
        }

        self.record(VelaCommand::CopyBuffer {
            src: VelaBuffer::Null(src.clone()),
            src_offset,
            dst: VelaBuffer::Null(dst.clone()),
            dst_offset,
            size,
        })
    }

    pub fn set_marker(
        &mut self,
        label: &str,
    ) -> VelaResult<()> {
        self.record(VelaCommand::SetMarker(label.to_string()))
    }

    fn check_graphics(
        &self,
        operation: &str,
    ) -> VelaResult<()> {
        if self.queue_type != VelaQueueType::Graphics {
            return Err(format!(
                "{} can only be recorded for a graphics queue, this list is for {:?}",
                operation, self.queue_type
            ))?;
        }

        Ok(())
    }
}

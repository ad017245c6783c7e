use crate::null::VelaBufferNull;
use crate::{VelaBufferDef, VelaResourceId, VelaResult};

/// A linear range of GPU memory.
///
/// Cloning is cheap and shares the underlying resource. It is destroyed once the last clone is
/// dropped, which must not happen while submitted GPU work still references it.
#[derive(Clone, Debug)]
pub enum VelaBuffer {
    Null(VelaBufferNull),
}

impl VelaBuffer {
    pub fn buffer_def(&self) -> &VelaBufferDef {
        match self {
            VelaBuffer::Null(inner) => inner.buffer_def(),
        }
    }

    pub fn resource_id(&self) -> VelaResourceId {
        match self {
            VelaBuffer::Null(inner) => inner.resource_id(),
        }
    }

    /// Copy data into the buffer at the given byte offset. The buffer must be CPU-visible.
    pub fn copy_to_host_visible_buffer(
        &self,
        data: &[u8],
        buffer_byte_offset: u64,
    ) -> VelaResult<()> {
        match self {
            VelaBuffer::Null(inner) => inner.copy_to_host_visible_buffer(data, buffer_byte_offset),
        }
    }

    /// Read data back from a CPU-visible buffer
    pub fn read_host_visible_buffer(
        &self,
        buffer_byte_offset: u64,
        size: u64,
    ) -> VelaResult<Vec<u8>> {
        match self {
            VelaBuffer::Null(inner) => inner.read_host_visible_buffer(buffer_byte_offset, size),
        }
    }

    /// Get the underlying null buffer, if this is a null buffer
    pub fn null_buffer(&self) -> Option<&VelaBufferNull> {
        match self {
            VelaBuffer::Null(inner) => Some(inner),
        }
    }
}

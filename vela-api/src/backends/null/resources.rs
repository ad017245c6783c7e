use super::NullGpu;
use crate::{VelaBufferDef, VelaResourceId, VelaResult, VelaTextureDef};
use std::sync::{Arc, Mutex};

//
// Textures
//
#[derive(Debug)]
struct NullTextureInner {
    texture_def: VelaTextureDef,
    resource_id: VelaResourceId,
    gpu: Arc<NullGpu>,
}

impl Drop for NullTextureInner {
    fn drop(&mut self) {
        self.gpu
            .unregister_resource(self.resource_id, self.texture_def.subresource_count());
    }
}

/// Textures have no backing memory in the null backend, only a tracked state per subresource
#[derive(Clone, Debug)]
pub struct VelaTextureNull {
    inner: Arc<NullTextureInner>,
}

impl VelaTextureNull {
    pub(crate) fn new(
        gpu: &Arc<NullGpu>,
        texture_def: &VelaTextureDef,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;
        texture_def.verify()?;

        let resource_id = VelaResourceId(gpu.allocate_object_id());
        gpu.register_resource(resource_id, texture_def.subresource_count());
        log::trace!(
            "Created texture {} {:?} {:?}",
            resource_id,
            texture_def.extents,
            texture_def.format
        );

        let inner = NullTextureInner {
            texture_def: texture_def.clone(),
            resource_id,
            gpu: gpu.clone(),
        };

        Ok(VelaTextureNull {
            inner: Arc::new(inner),
        })
    }

    pub fn texture_def(&self) -> &VelaTextureDef {
        &self.inner.texture_def
    }

    pub fn resource_id(&self) -> VelaResourceId {
        self.inner.resource_id
    }
}

//
// Buffers
//
struct NullBufferInner {
    buffer_def: VelaBufferDef,
    resource_id: VelaResourceId,
    memory: Mutex<Vec<u8>>,
    gpu: Arc<NullGpu>,
}

impl std::fmt::Debug for NullBufferInner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NullBufferInner")
            .field("buffer_def", &self.buffer_def)
            .field("resource_id", &self.resource_id)
            .finish()
    }
}

impl Drop for NullBufferInner {
    fn drop(&mut self) {
        self.gpu.unregister_resource(self.resource_id, 1);
    }
}

/// Buffers are backed by host memory so copies executed by a queue really move bytes
#[derive(Clone, Debug)]
pub struct VelaBufferNull {
    inner: Arc<NullBufferInner>,
}

impl VelaBufferNull {
    pub(crate) fn new(
        gpu: &Arc<NullGpu>,
        buffer_def: &VelaBufferDef,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;
        buffer_def.verify()?;

        let resource_id = VelaResourceId(gpu.allocate_object_id());
        gpu.register_resource(resource_id, 1);
        log::trace!(
            "Created buffer {} of {} bytes ({:?})",
            resource_id,
            buffer_def.size,
            buffer_def.memory_usage
        );

        let inner = NullBufferInner {
            buffer_def: buffer_def.clone(),
            resource_id,
            memory: Mutex::new(vec![0; buffer_def.size as usize]),
            gpu: gpu.clone(),
        };

        Ok(VelaBufferNull {
            inner: Arc::new(inner),
        })
    }

    pub fn buffer_def(&self) -> &VelaBufferDef {
        &self.inner.buffer_def
    }

    pub fn resource_id(&self) -> VelaResourceId {
        self.inner.resource_id
    }

    /// Write from the CPU. Only allowed for CPU-visible memory.
    pub fn copy_to_host_visible_buffer(
        &self,
        data: &[u8],
        buffer_byte_offset: u64,
    ) -> VelaResult<()> {
        self.check_host_access(buffer_byte_offset, data.len() as u64)?;
        let start = buffer_byte_offset as usize;
        self.with_memory(|memory| memory[start..start + data.len()].copy_from_slice(data));
        Ok(())
    }

    /// Read from the CPU. Only allowed for CPU-visible memory.
    pub fn read_host_visible_buffer(
        &self,
        buffer_byte_offset: u64,
        size: u64,
    ) -> VelaResult<Vec<u8>> {
        self.check_host_access(buffer_byte_offset, size)?;
        let start = buffer_byte_offset as usize;
        Ok(self.with_memory(|memory| memory[start..start + size as usize].to_vec()))
    }

    /// Snapshot of the whole buffer regardless of memory usage, for inspecting results
    pub fn contents(&self) -> Vec<u8> {
        self.with_memory(|memory| memory.clone())
    }

    pub(crate) fn with_memory<T, F: FnOnce(&mut Vec<u8>) -> T>(
        &self,
        f: F,
    ) -> T {
        let mut memory = self.inner.memory.lock().unwrap();
        (f)(&mut *memory)
    }

    fn check_host_access(
        &self,
        offset: u64,
        size: u64,
    ) -> VelaResult<()> {
        self.inner.gpu.check_removed()?;

        if !self.inner.buffer_def.memory_usage.is_cpu_visible() {
            return Err(format!(
                "Buffer {} is GPU-only and can't be accessed by the CPU",
                self.inner.resource_id
            ))?;
        }

        if offset + size > self.inner.buffer_def.size {
            return Err(format!(
                "Access of {} bytes at offset {} is past the end of buffer {} ({} bytes)",
                size, offset, self.inner.resource_id, self.inner.buffer_def.size
            ))?;
        }

        Ok(())
    }
}

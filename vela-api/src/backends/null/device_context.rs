use super::{
    NullGpu, VelaApiDefNull, VelaBufferNull, VelaCommandListNull, VelaDescriptorHeapNull,
    VelaExecutedCommand, VelaPipelineNull, VelaQueueNull, VelaRootSignatureNull, VelaTextureNull,
};
use crate::{
    VelaBufferDef, VelaDescriptorHeapDef, VelaPipelineDef, VelaQueueType, VelaResourceId,
    VelaResourceState, VelaResult, VelaRootSignatureDef, VelaTextureDef,
};
use fnv::FnvHashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct NullDeviceContextInner {
    gpu: Arc<NullGpu>,
    queues: Mutex<FnvHashMap<VelaQueueType, VelaQueueNull>>,
}

#[derive(Clone, Debug)]
pub struct VelaDeviceContextNull {
    inner: Arc<NullDeviceContextInner>,
}

impl VelaDeviceContextNull {
    pub fn new(api_def: &VelaApiDefNull) -> Self {
        let inner = NullDeviceContextInner {
            gpu: Arc::new(NullGpu::new(api_def.execution_latency)),
            queues: Default::default(),
        };

        VelaDeviceContextNull {
            inner: Arc::new(inner),
        }
    }

    /// Returns the same queue every time it is called with the same queue type
    pub fn create_queue(
        &self,
        queue_type: VelaQueueType,
    ) -> VelaResult<VelaQueueNull> {
        let mut queues = self.inner.queues.lock().unwrap();
        if let Some(queue) = queues.get(&queue_type) {
            return Ok(queue.clone());
        }

        let queue = VelaQueueNull::new(&self.inner.gpu, queue_type)?;
        queues.insert(queue_type, queue.clone());
        Ok(queue)
    }

    pub fn create_texture(
        &self,
        texture_def: &VelaTextureDef,
    ) -> VelaResult<VelaTextureNull> {
        VelaTextureNull::new(&self.inner.gpu, texture_def)
    }

    pub fn create_buffer(
        &self,
        buffer_def: &VelaBufferDef,
    ) -> VelaResult<VelaBufferNull> {
        VelaBufferNull::new(&self.inner.gpu, buffer_def)
    }

    pub fn create_descriptor_heap(
        &self,
        heap_def: &VelaDescriptorHeapDef,
    ) -> VelaResult<VelaDescriptorHeapNull> {
        VelaDescriptorHeapNull::new(&self.inner.gpu, heap_def)
    }

    pub fn create_command_list(
        &self,
        queue_type: VelaQueueType,
    ) -> VelaResult<VelaCommandListNull> {
        VelaCommandListNull::new(&self.inner.gpu, queue_type)
    }

    pub fn create_root_signature(
        &self,
        root_signature_def: &VelaRootSignatureDef,
    ) -> VelaResult<VelaRootSignatureNull> {
        VelaRootSignatureNull::new(&self.inner.gpu, root_signature_def)
    }

    pub fn create_pipeline(
        &self,
        root_signature: &VelaRootSignatureNull,
        pipeline_def: &VelaPipelineDef,
    ) -> VelaResult<VelaPipelineNull> {
        VelaPipelineNull::new(&self.inner.gpu, root_signature, pipeline_def)
    }

    /// Flush every queue created so far
    pub fn wait_for_idle(&self) -> VelaResult<()> {
        let queues: Vec<_> = self.inner.queues.lock().unwrap().values().cloned().collect();
        for queue in queues {
            queue.wait_for_queue_idle()?;
        }

        Ok(())
    }

    //
    // Inspection, only available on the null backend
    //
    pub fn executed_commands(&self) -> Vec<VelaExecutedCommand> {
        self.inner.gpu.executed_commands()
    }

    pub fn clear_executed_commands(&self) {
        self.inner.gpu.clear_executed_commands()
    }

    pub fn validation_errors(&self) -> Vec<String> {
        self.inner.gpu.validation_errors()
    }

    /// The state the GPU timeline has reached for a subresource, as opposed to the state the CPU
    /// believes it will be in once submitted work completes
    pub fn gpu_resource_state(
        &self,
        resource: VelaResourceId,
        subresource: u32,
    ) -> Option<VelaResourceState> {
        self.inner.gpu.resource_state(resource, subresource)
    }

    pub fn simulate_device_removed(&self) {
        self.inner.gpu.set_removed();
    }
}

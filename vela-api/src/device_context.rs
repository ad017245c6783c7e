use crate::null::VelaDeviceContextNull;
use crate::{
    VelaBuffer, VelaBufferDef, VelaCommandList, VelaDescriptorHeap, VelaDescriptorHeapDef,
    VelaPipeline, VelaPipelineDef, VelaQueue, VelaQueueType, VelaResult, VelaRootSignature,
    VelaRootSignatureDef, VelaTexture, VelaTextureDef,
};

/// A cloneable, thread-safe handle used to create graphics resources.
///
/// All device contexts and resources must be dropped before the `VelaApi` that created them.
#[derive(Clone, Debug)]
pub enum VelaDeviceContext {
    Null(VelaDeviceContextNull),
}

impl VelaDeviceContext {
    /// Create a queue. Repeated calls with the same queue type return the same underlying queue.
    pub fn create_queue(
        &self,
        queue_type: VelaQueueType,
    ) -> VelaResult<VelaQueue> {
        Ok(match self {
            VelaDeviceContext::Null(inner) => VelaQueue::Null(inner.create_queue(queue_type)?),
        })
    }

    /// Textures are created in the COMMON state
    pub fn create_texture(
        &self,
        texture_def: &VelaTextureDef,
    ) -> VelaResult<VelaTexture> {
        Ok(match self {
            VelaDeviceContext::Null(inner) => VelaTexture::Null(inner.create_texture(texture_def)?),
        })
    }

    /// Buffers are created in the COMMON state
    pub fn create_buffer(
        &self,
        buffer_def: &VelaBufferDef,
    ) -> VelaResult<VelaBuffer> {
        Ok(match self {
            VelaDeviceContext::Null(inner) => VelaBuffer::Null(inner.create_buffer(buffer_def)?),
        })
    }

    pub fn create_descriptor_heap(
        &self,
        heap_def: &VelaDescriptorHeapDef,
    ) -> VelaResult<VelaDescriptorHeap> {
        Ok(match self {
            VelaDeviceContext::Null(inner) => {
                VelaDescriptorHeap::Null(inner.create_descriptor_heap(heap_def)?)
            }
        })
    }

    /// Create a command list in the open (recording) state
    pub fn create_command_list(
        &self,
        queue_type: VelaQueueType,
    ) -> VelaResult<VelaCommandList> {
        Ok(match self {
            VelaDeviceContext::Null(inner) => {
                VelaCommandList::Null(inner.create_command_list(queue_type)?)
            }
        })
    }

    pub fn create_root_signature(
        &self,
        root_signature_def: &VelaRootSignatureDef,
    ) -> VelaResult<VelaRootSignature> {
        Ok(match self {
            VelaDeviceContext::Null(inner) => {
                VelaRootSignature::Null(inner.create_root_signature(root_signature_def)?)
            }
        })
    }

    pub fn create_pipeline(
        &self,
        root_signature: &VelaRootSignature,
        pipeline_def: &VelaPipelineDef,
    ) -> VelaResult<VelaPipeline> {
        Ok(match (self, root_signature) {
            (VelaDeviceContext::Null(inner), VelaRootSignature::Null(root_signature)) => {
                VelaPipeline::Null(inner.create_pipeline(root_signature, pipeline_def)?)
            }
        })
    }

    /// Block until every queue has finished all submitted work
    pub fn wait_for_idle(&self) -> VelaResult<()> {
        match self {
            VelaDeviceContext::Null(inner) => inner.wait_for_idle(),
        }
    }

    /// Get the underlying null device context, if this is a null device context
    pub fn null_device_context(&self) -> Option<&VelaDeviceContextNull> {
        match self {
            VelaDeviceContext::Null(inner) => Some(inner),
        }
    }
}

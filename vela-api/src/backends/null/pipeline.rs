use super::NullGpu;
use crate::{VelaPipelineDef, VelaRootSignatureDef, VelaResult};
use std::sync::Arc;

#[derive(Debug)]
struct NullRootSignatureInner {
    def: VelaRootSignatureDef,
    id: u64,
}

#[derive(Clone, Debug)]
pub struct VelaRootSignatureNull {
    inner: Arc<NullRootSignatureInner>,
}

impl VelaRootSignatureNull {
    pub(crate) fn new(
        gpu: &NullGpu,
        def: &VelaRootSignatureDef,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;

        let inner = NullRootSignatureInner {
            def: def.clone(),
            id: gpu.allocate_object_id(),
        };

        Ok(VelaRootSignatureNull {
            inner: Arc::new(inner),
        })
    }

    pub fn root_signature_def(&self) -> &VelaRootSignatureDef {
        &self.inner.def
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

#[derive(Debug)]
struct NullPipelineInner {
    def: VelaPipelineDef,
    root_signature: VelaRootSignatureNull,
    id: u64,
}

#[derive(Clone, Debug)]
pub struct VelaPipelineNull {
    inner: Arc<NullPipelineInner>,
}

impl VelaPipelineNull {
    pub(crate) fn new(
        gpu: &NullGpu,
        root_signature: &VelaRootSignatureNull,
        def: &VelaPipelineDef,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;
        def.verify()?;

        let inner = NullPipelineInner {
            def: def.clone(),
            root_signature: root_signature.clone(),
            id: gpu.allocate_object_id(),
        };

        Ok(VelaPipelineNull {
            inner: Arc::new(inner),
        })
    }

    pub fn pipeline_def(&self) -> &VelaPipelineDef {
        &self.inner.def
    }

    pub fn root_signature(&self) -> &VelaRootSignatureNull {
        &self.inner.root_signature
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

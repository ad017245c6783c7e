use crate::null::{VelaPipelineNull, VelaRootSignatureNull};
use crate::{VelaPipelineDef, VelaRootSignatureDef};

/// Describes the resource bindings shared by a set of pipelines
#[derive(Clone, Debug)]
pub enum VelaRootSignature {
    Null(VelaRootSignatureNull),
}

impl VelaRootSignature {
    pub fn root_signature_def(&self) -> &VelaRootSignatureDef {
        match self {
            VelaRootSignature::Null(inner) => inner.root_signature_def(),
        }
    }

    /// Get the underlying null root signature, if this is a null root signature
    pub fn null_root_signature(&self) -> Option<&VelaRootSignatureNull> {
        match self {
            VelaRootSignature::Null(inner) => Some(inner),
        }
    }
}

/// A compiled graphics or compute pipeline state object
#[derive(Clone, Debug)]
pub enum VelaPipeline {
    Null(VelaPipelineNull),
}

impl VelaPipeline {
    pub fn pipeline_def(&self) -> &VelaPipelineDef {
        match self {
            VelaPipeline::Null(inner) => inner.pipeline_def(),
        }
    }

    pub fn root_signature(&self) -> VelaRootSignature {
        match self {
            VelaPipeline::Null(inner) => VelaRootSignature::Null(inner.root_signature().clone()),
        }
    }

    /// Get the underlying null pipeline, if this is a null pipeline
    pub fn null_pipeline(&self) -> Option<&VelaPipelineNull> {
        match self {
            VelaPipeline::Null(inner) => Some(inner),
        }
    }
}

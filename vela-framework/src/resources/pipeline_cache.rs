use fnv::FnvHashMap;
use vela_api::{
    VelaDeviceContext, VelaPipeline, VelaPipelineDef, VelaResult, VelaRootSignature,
    VelaRootSignatureDef,
};

/// Canonical cache key of a root signature
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RootSignatureKey {
    pub root_signature_def: VelaRootSignatureDef,
}

/// Canonical cache key of a pipeline. Includes the root signature it was created against.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub root_signature: RootSignatureKey,
    pub pipeline_def: VelaPipelineDef,
}

/// Creates root signatures and pipelines once and hands out the cached objects afterwards.
/// Passes fill it from `create_root_signatures`/`create_pipeline_states` every frame, so the
/// calls must be cheap when nothing changed.
pub struct PipelineCache {
    device_context: VelaDeviceContext,
    root_signatures: FnvHashMap<RootSignatureKey, VelaRootSignature>,
    pipelines: FnvHashMap<PipelineKey, VelaPipeline>,
    pipelines_by_name: FnvHashMap<String, PipelineKey>,
}

impl PipelineCache {
    pub fn new(device_context: &VelaDeviceContext) -> Self {
        PipelineCache {
            device_context: device_context.clone(),
            root_signatures: Default::default(),
            pipelines: Default::default(),
            pipelines_by_name: Default::default(),
        }
    }

    pub fn get_or_create_root_signature(
        &mut self,
        root_signature_def: &VelaRootSignatureDef,
    ) -> VelaResult<VelaRootSignature> {
        let key = RootSignatureKey {
            root_signature_def: root_signature_def.clone(),
        };

        if let Some(root_signature) = self.root_signatures.get(&key) {
            return Ok(root_signature.clone());
        }

        log::debug!("Creating root signature {}", root_signature_def.name);
        let root_signature = self
            .device_context
            .create_root_signature(root_signature_def)?;
        self.root_signatures.insert(key, root_signature.clone());
        Ok(root_signature)
    }

    pub fn get_or_create_pipeline(
        &mut self,
        root_signature_def: &VelaRootSignatureDef,
        pipeline_def: &VelaPipelineDef,
    ) -> VelaResult<VelaPipeline> {
        let key = PipelineKey {
            root_signature: RootSignatureKey {
                root_signature_def: root_signature_def.clone(),
            },
            pipeline_def: pipeline_def.clone(),
        };

        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        let root_signature = self.get_or_create_root_signature(root_signature_def)?;
        log::debug!(
            "Creating {:?} pipeline {}",
            pipeline_def.pipeline_type,
            pipeline_def.name
        );
        let pipeline = self
            .device_context
            .create_pipeline(&root_signature, pipeline_def)?;

        if let Some(previous) = self
            .pipelines_by_name
            .insert(pipeline_def.name.clone(), key.clone())
        {
            log::debug!(
                "Pipeline {} was redefined, lookups by name return the newest definition",
                previous.pipeline_def.name
            );
        }

        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    /// The most recently created pipeline with this name
    pub fn pipeline(
        &self,
        name: &str,
    ) -> Option<&VelaPipeline> {
        self.pipelines_by_name
            .get(name)
            .and_then(|key| self.pipelines.get(key))
    }

    pub fn root_signature_count(&self) -> usize {
        self.root_signatures.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn clear(&mut self) {
        self.pipelines_by_name.clear();
        self.pipelines.clear();
        self.root_signatures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::{VelaApi, VelaFormat, VelaPipelineType};

    fn forward_pipeline() -> VelaPipelineDef {
        VelaPipelineDef {
            name: "forward".to_string(),
            pipeline_type: VelaPipelineType::Graphics,
            render_target_formats: vec![VelaFormat::R8G8B8A8_UNORM],
            depth_stencil_format: Some(VelaFormat::D32_SFLOAT),
        }
    }

    #[test]
    fn test_identical_definitions_are_created_once() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut cache = PipelineCache::new(&api.device_context());
        let root_signature_def = VelaRootSignatureDef {
            name: "mesh".to_string(),
            parameter_count: 4,
            static_sampler_count: 1,
        };

        let a = cache
            .get_or_create_pipeline(&root_signature_def, &forward_pipeline())
            .unwrap();
        let b = cache
            .get_or_create_pipeline(&root_signature_def, &forward_pipeline())
            .unwrap();
        assert_eq!(
            a.null_pipeline().unwrap().id(),
            b.null_pipeline().unwrap().id()
        );
        assert_eq!(cache.root_signature_count(), 1);
        assert_eq!(cache.pipeline_count(), 1);

        let mut changed = forward_pipeline();
        changed.depth_stencil_format = None;
        cache
            .get_or_create_pipeline(&root_signature_def, &changed)
            .unwrap();
        assert_eq!(cache.pipeline_count(), 2);
        assert!(cache
            .pipeline("forward")
            .unwrap()
            .pipeline_def()
            .depth_stencil_format
            .is_none());
    }

    #[test]
    fn test_invalid_definition_is_not_cached() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut cache = PipelineCache::new(&api.device_context());
        let mut invalid = forward_pipeline();
        invalid.pipeline_type = VelaPipelineType::Compute;

        assert!(cache
            .get_or_create_pipeline(&Default::default(), &invalid)
            .is_err());
        assert_eq!(cache.pipeline_count(), 0);
    }
}

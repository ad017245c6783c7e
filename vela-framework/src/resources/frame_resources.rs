use crate::descriptors::{DescriptorAllocation, DescriptorAllocator};
use crate::graph::{FrameResourceCreationInfo, RenderGraphResourceLifetime};
use crate::renderer::RendererConfig;
use crate::resources::GlobalResourceStateTracker;
use fnv::FnvHashMap;
use vela_api::{
    VelaBuffer, VelaCpuDescriptorHandle, VelaDescriptorHeapType, VelaDescriptorView,
    VelaDeviceContext, VelaResourceId, VelaResourceState, VelaResourceUsage, VelaResult,
    VelaTexture,
};
use vela_base::Name;

/// The physical resource behind a graph resource
#[derive(Clone, Debug)]
pub enum FrameResourceHandle {
    Texture(VelaTexture),
    Buffer(VelaBuffer),
}

impl FrameResourceHandle {
    pub fn resource_id(&self) -> VelaResourceId {
        match self {
            FrameResourceHandle::Texture(texture) => texture.resource_id(),
            FrameResourceHandle::Buffer(buffer) => buffer.resource_id(),
        }
    }

    pub fn texture(&self) -> Option<&VelaTexture> {
        match self {
            FrameResourceHandle::Texture(texture) => Some(texture),
            FrameResourceHandle::Buffer(_) => None,
        }
    }

    pub fn buffer(&self) -> Option<&VelaBuffer> {
        match self {
            FrameResourceHandle::Texture(_) => None,
            FrameResourceHandle::Buffer(buffer) => Some(buffer),
        }
    }
}

/// CPU descriptors created for a frame resource according to its usage flags
#[derive(Debug, Default)]
pub struct FrameResourceViews {
    // One render target view per subresource
    rtv: Option<DescriptorAllocation>,
    // Writable view followed by a read-only view
    dsv: Option<DescriptorAllocation>,
    srv: Option<DescriptorAllocation>,
    uav: Option<DescriptorAllocation>,
}

impl FrameResourceViews {
    pub fn rtv(
        &self,
        subresource: u32,
    ) -> Option<VelaCpuDescriptorHandle> {
        self.rtv
            .as_ref()
            .filter(|x| subresource < x.count())
            .map(|x| x.cpu_handle(subresource))
    }

    pub fn dsv(
        &self,
        read_only: bool,
    ) -> Option<VelaCpuDescriptorHandle> {
        self.dsv
            .as_ref()
            .map(|x| x.cpu_handle(if read_only { 1 } else { 0 }))
    }

    pub fn srv(&self) -> Option<VelaCpuDescriptorHandle> {
        self.srv.as_ref().map(|x| x.cpu_handle(0))
    }

    pub fn uav(&self) -> Option<VelaCpuDescriptorHandle> {
        self.uav.as_ref().map(|x| x.cpu_handle(0))
    }
}

struct FrameResource {
    info_hash: u64,
    creation_info: FrameResourceCreationInfo,
    handle: FrameResourceHandle,
    views: FrameResourceViews,
    lifetime: RenderGraphResourceLifetime,
    // Only set for imported resources
    final_state: Option<VelaResourceState>,
    last_used_frame: u64,
}

// Replaced or evicted resource waiting for the GPU to finish the last frame that used it
struct RetiredFrameResource {
    handle: FrameResourceHandle,
    views: FrameResourceViews,
    last_used_frame: u64,
}

/// An imported resource and the state it must be returned to at the end of the frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExternalResourceState {
    pub name: Name,
    pub resource: VelaResourceId,
    pub subresource_count: u32,
    pub final_state: VelaResourceState,
}

/// Owns the physical resources the graph resolves names to.
///
/// `create_resource` is idempotent on the creation info: identical info reuses the existing
/// resource, different info replaces it. Replaced and evicted resources are destroyed once
/// `update` reports the last frame that used them as complete.
pub struct FrameResourceProvider {
    device_context: VelaDeviceContext,
    resources: FnvHashMap<Name, FrameResource>,
    retired: Vec<RetiredFrameResource>,
    rtv_allocator: DescriptorAllocator,
    dsv_allocator: DescriptorAllocator,
    srv_uav_allocator: DescriptorAllocator,
    retention_frames: u64,
}

impl FrameResourceProvider {
    pub fn new(
        device_context: &VelaDeviceContext,
        config: &RendererConfig,
    ) -> Self {
        FrameResourceProvider {
            device_context: device_context.clone(),
            resources: Default::default(),
            retired: Default::default(),
            rtv_allocator: DescriptorAllocator::new(
                device_context,
                VelaDescriptorHeapType::RenderTargetView,
                config.rtv_page_size,
            ),
            dsv_allocator: DescriptorAllocator::new(
                device_context,
                VelaDescriptorHeapType::DepthStencilView,
                config.dsv_page_size,
            ),
            srv_uav_allocator: DescriptorAllocator::new(
                device_context,
                VelaDescriptorHeapType::CbvSrvUav,
                config.srv_uav_page_size,
            ),
            retention_frames: config.resource_retention_frames as u64,
        }
    }

    /// Make sure a physical resource matching `creation_info` exists under `name`. Returns true
    /// if a resource was created.
    #[profiling::function]
    pub fn create_resource(
        &mut self,
        name: Name,
        creation_info: &FrameResourceCreationInfo,
        lifetime: RenderGraphResourceLifetime,
        global: &mut GlobalResourceStateTracker,
        frame: u64,
    ) -> VelaResult<bool> {
        let info_hash = creation_info.hash_value();
        if let Some(existing) = self.resources.get_mut(&name) {
            if existing.info_hash == info_hash && existing.creation_info == *creation_info {
                log::trace!("REUSE {:?} {}", name, existing.handle.resource_id());
                existing.last_used_frame = frame;
                return Ok(false);
            }
        }

        let handle = match creation_info {
            FrameResourceCreationInfo::Texture(texture_def) => {
                FrameResourceHandle::Texture(self.device_context.create_texture(texture_def)?)
            }
            FrameResourceCreationInfo::Buffer(buffer_def) => {
                FrameResourceHandle::Buffer(self.device_context.create_buffer(buffer_def)?)
            }
        };

        let views = self.create_views(&handle, creation_info)?;
        global.track_resource(
            handle.resource_id(),
            creation_info.subresource_count(),
            VelaResourceState::COMMON,
        );

        log::debug!(
            "CREATE {:?} {} {:?}",
            name,
            handle.resource_id(),
            creation_info
        );
        let old = self.resources.insert(
            name,
            FrameResource {
                info_hash,
                creation_info: creation_info.clone(),
                handle,
                views,
                lifetime,
                final_state: None,
                last_used_frame: frame,
            },
        );

        if let Some(old) = old {
            self.retire(old);
        }

        Ok(true)
    }

    /// Register a texture owned outside the graph. It is tracked in `final_state` the first time
    /// it is seen and must be back in `final_state` whenever its owner uses it.
    pub fn import_texture(
        &mut self,
        name: Name,
        texture: &VelaTexture,
        final_state: VelaResourceState,
        global: &mut GlobalResourceStateTracker,
        frame: u64,
    ) -> VelaResult<()> {
        if let Some(existing) = self.resources.get_mut(&name) {
            if existing.handle.resource_id() == texture.resource_id() {
                existing.final_state = Some(final_state);
                existing.last_used_frame = frame;
                return Ok(());
            }
        }

        let creation_info = FrameResourceCreationInfo::Texture(texture.texture_def().clone());
        let handle = FrameResourceHandle::Texture(texture.clone());
        let views = self.create_views(&handle, &creation_info)?;
        if !global.is_tracked(texture.resource_id()) {
            global.track_resource(
                texture.resource_id(),
                creation_info.subresource_count(),
                final_state,
            );
        }

        log::debug!("IMPORT {:?} {}", name, texture.resource_id());
        let old = self.resources.insert(
            name,
            FrameResource {
                info_hash: creation_info.hash_value(),
                creation_info,
                handle,
                views,
                lifetime: RenderGraphResourceLifetime::External,
                final_state: Some(final_state),
                last_used_frame: frame,
            },
        );

        if let Some(old) = old {
            self.retire(old);
        }

        Ok(())
    }

    fn create_views(
        &mut self,
        handle: &FrameResourceHandle,
        creation_info: &FrameResourceCreationInfo,
    ) -> VelaResult<FrameResourceViews> {
        let resource = handle.resource_id();
        let usage = match creation_info {
            FrameResourceCreationInfo::Texture(texture_def) => texture_def.usage,
            FrameResourceCreationInfo::Buffer(buffer_def) => buffer_def.usage,
        };

        let mut views = FrameResourceViews::default();
        if usage.contains(VelaResourceUsage::RENDER_TARGET) {
            let count = creation_info.subresource_count();
            let allocation = self.rtv_allocator.allocate(count)?;
            for subresource in 0..count {
                self.rtv_allocator.write_descriptor(
                    &allocation,
                    subresource,
                    &VelaDescriptorView::RenderTarget {
                        resource,
                        subresource,
                    },
                )?;
            }
            views.rtv = Some(allocation);
        }

        if usage.contains(VelaResourceUsage::DEPTH_STENCIL) {
            let allocation = self.dsv_allocator.allocate(2)?;
            for (index, read_only) in [false, true].iter().enumerate() {
                self.dsv_allocator.write_descriptor(
                    &allocation,
                    index as u32,
                    &VelaDescriptorView::DepthStencil {
                        resource,
                        read_only: *read_only,
                    },
                )?;
            }
            views.dsv = Some(allocation);
        }

        if usage.contains(VelaResourceUsage::SHADER_RESOURCE) {
            let allocation = self.srv_uav_allocator.allocate(1)?;
            self.srv_uav_allocator.write_descriptor(
                &allocation,
                0,
                &VelaDescriptorView::ShaderResource { resource },
            )?;
            views.srv = Some(allocation);
        }

        if usage.contains(VelaResourceUsage::UNORDERED_ACCESS) {
            let allocation = self.srv_uav_allocator.allocate(1)?;
            self.srv_uav_allocator.write_descriptor(
                &allocation,
                0,
                &VelaDescriptorView::UnorderedAccess { resource },
            )?;
            views.uav = Some(allocation);
        }

        Ok(views)
    }

    fn free_views(
        &mut self,
        views: FrameResourceViews,
    ) {
        if let Some(rtv) = views.rtv {
            self.rtv_allocator.free(rtv);
        }
        if let Some(dsv) = views.dsv {
            self.dsv_allocator.free(dsv);
        }
        if let Some(srv) = views.srv {
            self.srv_uav_allocator.free(srv);
        }
        if let Some(uav) = views.uav {
            self.srv_uav_allocator.free(uav);
        }
    }

    fn retire(
        &mut self,
        resource: FrameResource,
    ) {
        log::debug!(
            "RETIRE {} (last used in frame {})",
            resource.handle.resource_id(),
            resource.last_used_frame
        );
        self.retired.push(RetiredFrameResource {
            handle: resource.handle,
            views: resource.views,
            last_used_frame: resource.last_used_frame,
        });
    }

    /// Retire transient resources no frame has used for the configured number of frames
    pub fn evict_unused(
        &mut self,
        current_frame: u64,
    ) {
        let retention_frames = self.retention_frames;
        let evicted: Vec<Name> = self
            .resources
            .iter()
            .filter(|(_, x)| {
                x.lifetime == RenderGraphResourceLifetime::Transient
                    && x.last_used_frame + retention_frames < current_frame
            })
            .map(|(name, _)| *name)
            .collect();

        for name in evicted {
            if let Some(resource) = self.resources.remove(&name) {
                log::debug!("EVICT {:?}", name);
                self.retire(resource);
            }
        }
    }

    /// Destroy retired resources whose last frame has completed on the GPU
    pub fn update(
        &mut self,
        last_completed_frame: u64,
        global: &mut GlobalResourceStateTracker,
    ) {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|x| x.last_used_frame <= last_completed_frame);
        self.retired = waiting;

        for retired in ready {
            let resource = retired.handle.resource_id();
            // An imported texture can be retired and imported again while its old entry waits.
            // The live entry still owns the tracked state.
            let is_live = self
                .resources
                .values()
                .any(|x| x.handle.resource_id() == resource);
            if is_live {
                log::trace!("RELEASE {} (still imported)", resource);
            } else {
                log::trace!("DESTROY {}", resource);
                global.untrack_resource(resource);
            }
            self.free_views(retired.views);
        }
    }

    /// Drop every resource. The GPU must be idle.
    pub fn clear(
        &mut self,
        global: &mut GlobalResourceStateTracker,
    ) {
        let resources: Vec<_> = self.resources.drain().map(|(_, x)| x).collect();
        for resource in resources {
            self.retire(resource);
        }

        self.update(u64::MAX, global);
    }

    fn get(
        &self,
        name: Name,
    ) -> VelaResult<&FrameResource> {
        self.resources
            .get(&name)
            .ok_or_else(|| format!("Frame resource {:?} was never created", name).into())
    }

    pub fn handle(
        &self,
        name: Name,
    ) -> VelaResult<&FrameResourceHandle> {
        Ok(&self.get(name)?.handle)
    }

    pub fn get_texture(
        &self,
        name: Name,
    ) -> VelaResult<&VelaTexture> {
        self.get(name)?
            .handle
            .texture()
            .ok_or_else(|| format!("Frame resource {:?} is not a texture", name).into())
    }

    pub fn get_buffer(
        &self,
        name: Name,
    ) -> VelaResult<&VelaBuffer> {
        self.get(name)?
            .handle
            .buffer()
            .ok_or_else(|| format!("Frame resource {:?} is not a buffer", name).into())
    }

    pub fn resource_id(
        &self,
        name: Name,
    ) -> VelaResult<VelaResourceId> {
        Ok(self.get(name)?.handle.resource_id())
    }

    pub fn views(
        &self,
        name: Name,
    ) -> VelaResult<&FrameResourceViews> {
        Ok(&self.get(name)?.views)
    }

    /// Imported resources used in `frame`, sorted by name
    pub fn external_resources(
        &self,
        frame: u64,
    ) -> Vec<ExternalResourceState> {
        let mut external: Vec<_> = self
            .resources
            .iter()
            .filter(|(_, x)| x.last_used_frame == frame)
            .filter_map(|(name, x)| {
                x.final_state.map(|final_state| ExternalResourceState {
                    name: *name,
                    resource: x.handle.resource_id(),
                    subresource_count: x.creation_info.subresource_count(),
                    final_state,
                })
            })
            .collect();
        external.sort_by_key(|x| x.name);
        external
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::{VelaApi, VelaExtents3D, VelaFormat, VelaTextureDef};
    use vela_base::NameRegistry;

    fn texture_info(width: u32) -> FrameResourceCreationInfo {
        FrameResourceCreationInfo::Texture(VelaTextureDef {
            extents: VelaExtents3D {
                width,
                height: 64,
                depth: 1,
            },
            format: VelaFormat::R8G8B8A8_UNORM,
            usage: VelaResourceUsage::RENDER_TARGET | VelaResourceUsage::SHADER_RESOURCE,
            ..Default::default()
        })
    }

    #[test]
    fn test_identical_info_reuses_resource() {
        let _ = env_logger::builder().is_test(true).try_init();
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut names = NameRegistry::new();
        let color = names.intern("Color");
        let mut global = GlobalResourceStateTracker::new();
        let mut provider = FrameResourceProvider::new(&api.device_context(), &Default::default());
        let transient = RenderGraphResourceLifetime::Transient;

        assert!(provider
            .create_resource(color, &texture_info(64), transient, &mut global, 1)
            .unwrap());
        let first = provider.resource_id(color).unwrap();
        assert!(global.is_tracked(first));
        assert_eq!(global.state(first, 0), VelaResourceState::COMMON);

        assert!(!provider
            .create_resource(color, &texture_info(64), transient, &mut global, 2)
            .unwrap());
        assert_eq!(provider.resource_id(color).unwrap(), first);

        // A different size replaces the resource, the old one waits for frame 2 to complete
        assert!(provider
            .create_resource(color, &texture_info(128), transient, &mut global, 3)
            .unwrap());
        let second = provider.resource_id(color).unwrap();
        assert_ne!(second, first);
        assert_eq!(provider.retired_count(), 1);

        provider.update(1, &mut global);
        assert_eq!(provider.retired_count(), 1);
        assert!(global.is_tracked(first));

        provider.update(2, &mut global);
        assert_eq!(provider.retired_count(), 0);
        assert!(!global.is_tracked(first));
        assert!(global.is_tracked(second));

        provider.clear(&mut global);
        assert_eq!(global.tracked_resource_count(), 0);
    }

    #[test]
    fn test_reimported_texture_stays_tracked() {
        let _ = env_logger::builder().is_test(true).try_init();
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let device_context = api.device_context();
        let mut names = NameRegistry::new();
        let back_buffer = names.intern("BackBuffer");
        let mut global = GlobalResourceStateTracker::new();
        let mut provider = FrameResourceProvider::new(&device_context, &Default::default());

        let image_def = match texture_info(64) {
            FrameResourceCreationInfo::Texture(texture_def) => texture_def,
            FrameResourceCreationInfo::Buffer(_) => unreachable!(),
        };
        let a = device_context.create_texture(&image_def).unwrap();
        let b = device_context.create_texture(&image_def).unwrap();
        let present = VelaResourceState::COMMON;

        // Swapchain-style rotation: a, b, a while frames 1 and 2 are still in flight
        provider
            .import_texture(back_buffer, &a, present, &mut global, 1)
            .unwrap();
        provider
            .import_texture(back_buffer, &b, present, &mut global, 2)
            .unwrap();
        provider
            .import_texture(back_buffer, &a, present, &mut global, 3)
            .unwrap();
        assert_eq!(provider.retired_count(), 2);

        // The entry retired after frame 1 refers to the image imported again in frame 3
        provider.update(1, &mut global);
        assert_eq!(provider.retired_count(), 1);
        assert!(global.is_tracked(a.resource_id()));
        assert_eq!(global.state(a.resource_id(), 0), present);

        provider.update(2, &mut global);
        assert_eq!(provider.retired_count(), 0);
        assert!(!global.is_tracked(b.resource_id()));
        assert!(global.is_tracked(a.resource_id()));
        assert!(provider.views(back_buffer).unwrap().rtv(0).is_some());

        provider.clear(&mut global);
        assert_eq!(global.tracked_resource_count(), 0);
    }

    #[test]
    fn test_views_follow_usage() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut names = NameRegistry::new();
        let color = names.intern("Color");
        let mut global = GlobalResourceStateTracker::new();
        let mut provider = FrameResourceProvider::new(&api.device_context(), &Default::default());

        provider
            .create_resource(
                color,
                &texture_info(32),
                RenderGraphResourceLifetime::Transient,
                &mut global,
                1,
            )
            .unwrap();

        let views = provider.views(color).unwrap();
        assert!(views.rtv(0).is_some());
        assert!(views.rtv(1).is_none());
        assert!(views.srv().is_some());
        assert!(views.dsv(false).is_none());
        assert!(views.uav().is_none());

        provider.clear(&mut global);
    }

    #[test]
    fn test_lookup_of_unknown_name_fails() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut names = NameRegistry::new();
        let provider = FrameResourceProvider::new(&api.device_context(), &Default::default());
        assert!(provider.get_texture(names.intern("Missing")).is_err());
        assert!(provider.get_buffer(names.intern("Missing")).is_err());
    }

    #[test]
    fn test_unused_transients_are_evicted() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut names = NameRegistry::new();
        let color = names.intern("Color");
        let mut global = GlobalResourceStateTracker::new();
        let config = RendererConfig {
            resource_retention_frames: 2,
            ..Default::default()
        };
        let mut provider = FrameResourceProvider::new(&api.device_context(), &config);

        provider
            .create_resource(
                color,
                &texture_info(32),
                RenderGraphResourceLifetime::Transient,
                &mut global,
                1,
            )
            .unwrap();

        provider.evict_unused(3);
        assert_eq!(provider.resource_count(), 1);
        provider.evict_unused(4);
        assert_eq!(provider.resource_count(), 0);
        assert_eq!(provider.retired_count(), 1);

        provider.update(1, &mut global);
        assert_eq!(provider.retired_count(), 0);
    }
}

use super::FrameTimer;
use crate::descriptors::{DynamicDescriptorHeap, DynamicDescriptorTable};
use crate::graph::{
    RenderGraphError, RenderGraphNode, RenderGraphNodeId, RenderGraphPlan, ResourcePlanner,
};
use crate::resources::{
    FrameResourceProvider, FrameResourceViews, PipelineCache, ResourceStateTracker,
};
use crate::upload::{ResourceCopyManager, UploadAllocation, UploadError, UploadRingBuffer};
use vela_api::{
    VelaBuffer, VelaCommandList, VelaDescriptorHeap, VelaDescriptorView, VelaPipeline,
    VelaQueueType, VelaResourceId, VelaResourceState, VelaResult, VelaTexture,
};
use vela_base::{Name, NameRegistry};

/// A unit of GPU work registered with the `Renderer`. `R` is whatever per-frame data the
/// application hands to `Renderer::render_frame`.
///
/// Every frame, each active pass gets a node in the render graph named after the pass and
/// declares its resources in `prepare_resources`. The renderer transitions every declared resource
/// into the state its access implies before calling `render`.
pub trait RenderPass<R> {
    fn name(&self) -> &str;

    fn queue_type(&self) -> VelaQueueType {
        VelaQueueType::Graphics
    }

    /// Inactive passes get no node this frame
    fn is_active(
        &self,
        _render_data: &R,
    ) -> bool {
        true
    }

    fn prepare_resources(
        &mut self,
        planner: &mut ResourcePlanner,
        render_data: &R,
    ) -> Result<(), RenderGraphError>;

    fn create_root_signatures(
        &mut self,
        _pipeline_cache: &mut PipelineCache,
    ) -> VelaResult<()> {
        Ok(())
    }

    fn create_pipeline_states(
        &mut self,
        _pipeline_cache: &mut PipelineCache,
    ) -> VelaResult<()> {
        Ok(())
    }

    fn render(
        &mut self,
        render_data: &R,
        context: &mut PassRenderContext,
        timer: &FrameTimer,
    ) -> VelaResult<()>;
}

/// Everything a pass can touch while it records its command list
pub struct PassRenderContext<'a> {
    pub(super) command_list: &'a mut VelaCommandList,
    pub(super) state_tracker: &'a mut ResourceStateTracker,
    pub(super) frame_resources: &'a FrameResourceProvider,
    pub(super) plan: &'a RenderGraphPlan,
    pub(super) names: &'a NameRegistry,
    pub(super) upload_ring: &'a mut UploadRingBuffer,
    pub(super) copy_manager: &'a mut ResourceCopyManager,
    pub(super) dynamic_descriptors: &'a mut DynamicDescriptorHeap,
    pub(super) pipeline_cache: &'a PipelineCache,
    pub(super) frame_number: u64,
    pub(super) node: RenderGraphNodeId,
}

impl<'a> PassRenderContext<'a> {
    pub fn command_list(&mut self) -> &mut VelaCommandList {
        &mut *self.command_list
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn node(&self) -> &'a RenderGraphNode {
        self.plan.node(self.node)
    }

    pub fn plan(&self) -> &'a RenderGraphPlan {
        self.plan
    }

    pub fn names(&self) -> &'a NameRegistry {
        self.names
    }

    /// Canonical name of a resource declared this frame. Aliases resolve to the resource they
    /// alias.
    pub fn resolve(
        &self,
        name: &str,
    ) -> VelaResult<Name> {
        let resolved = self.names.find(name).and_then(|x| self.plan.resolve(x));
        Ok(resolved.ok_or_else(|| {
            format!("Resource {} is not part of this frame's render graph", name)
        })?)
    }

    pub fn texture(
        &self,
        name: &str,
    ) -> VelaResult<&'a VelaTexture> {
        let frame_resources = self.frame_resources;
        frame_resources.get_texture(self.resolve(name)?)
    }

    pub fn buffer(
        &self,
        name: &str,
    ) -> VelaResult<&'a VelaBuffer> {
        let frame_resources = self.frame_resources;
        frame_resources.get_buffer(self.resolve(name)?)
    }

    pub fn resource_id(
        &self,
        name: &str,
    ) -> VelaResult<VelaResourceId> {
        self.frame_resources.resource_id(self.resolve(name)?)
    }

    pub fn views(
        &self,
        name: &str,
    ) -> VelaResult<&'a FrameResourceViews> {
        let frame_resources = self.frame_resources;
        frame_resources.views(self.resolve(name)?)
    }

    //
    // State transitions
    //
    /// Request a transition. It is recorded on the next `flush_barriers`, or after `render`
    /// returns.
    pub fn transition(
        &mut self,
        name: &str,
        subresource: u32,
        state_after: VelaResourceState,
    ) -> VelaResult<()> {
        let resource = self.resource_id(name)?;
        self.state_tracker
            .resource_barrier(resource, subresource, state_after);
        Ok(())
    }

    pub fn transition_resource(
        &mut self,
        resource: VelaResourceId,
        subresource: u32,
        state_after: VelaResourceState,
    ) {
        self.state_tracker
            .resource_barrier(resource, subresource, state_after);
    }

    pub fn flush_barriers(&mut self) -> VelaResult<usize> {
        self.state_tracker.flush_barriers(&mut *self.command_list)
    }

    //
    // Uploads
    //
    pub fn upload(
        &mut self,
        data: &[u8],
        alignment: u64,
    ) -> Result<UploadAllocation, UploadError> {
        self.upload_ring.push(data, alignment)
    }

    /// Copy uploaded data into a buffer. The copy is submitted after the frame's last node.
    pub fn schedule_copy(
        &mut self,
        source: UploadAllocation,
        destination: &str,
        destination_offset: u64,
    ) -> VelaResult<()> {
        let destination = self.buffer(destination)?;
        self.copy_manager
            .schedule_buffer_copy(source, destination, destination_offset)
    }

    //
    // Descriptors and pipelines
    //
    pub fn descriptor_heap(&self) -> &VelaDescriptorHeap {
        self.dynamic_descriptors.heap()
    }

    /// Shader-visible descriptors valid until this frame completes
    pub fn allocate_descriptors(
        &mut self,
        count: u32,
    ) -> VelaResult<DynamicDescriptorTable> {
        self.dynamic_descriptors.allocate(count)
    }

    pub fn write_descriptor(
        &self,
        table: &DynamicDescriptorTable,
        index: u32,
        view: &VelaDescriptorView,
    ) -> VelaResult<()> {
        self.dynamic_descriptors
            .write_descriptor(table, index, view)
    }

    pub fn pipeline(
        &self,
        name: &str,
    ) -> VelaResult<&'a VelaPipeline> {
        let pipeline_cache = self.pipeline_cache;
        let pipeline = pipeline_cache
            .pipeline(name)
            .ok_or_else(|| format!("Pipeline {} was never created", name))?;
        Ok(pipeline)
    }
}

use super::{FrameSync, FrameTimer, PassRenderContext, RenderPass, RendererConfig};
use crate::descriptors::DynamicDescriptorHeap;
use crate::graph::{
    RenderGraphExtents, RenderGraphNodeId, RenderGraphPlan, RenderGraphResourceDesc,
    RenderGraphResourceLifetime, RenderGraphTextureDesc, ResourcePlanner,
};
use crate::resources::{
    CommandListPool, FrameResourceProvider, GlobalResourceStateTracker, PipelineCache,
    ResourceStateTracker,
};
use crate::upload::{ResourceCopyManager, UploadRingBuffer};
use fnv::FnvHashMap;
use vela_api::{
    VelaCommandList, VelaDeviceContext, VelaExtents2D, VelaQueue, VelaQueueType, VelaResourceId,
    VelaResourceState, VelaResult, VelaTexture,
};
use vela_base::{Name, NameRegistry};

// Leak detection for the command list pool. A frame uses at most two lists per node plus a few
// for copies and external transitions.
const MAX_COMMAND_LISTS_PER_QUEUE: u32 = 1024;

const UPLOAD_ALIGNMENT: u64 = 256;

/// What happened during one `Renderer::render_frame`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_number: u64,
    /// Names of the nodes in the order they were recorded and submitted
    pub execution_order: Vec<String>,
    /// GPU waits inserted between queues
    pub cross_queue_wait_count: usize,
    /// Submissions holding only barriers resolved against the global tracker
    pub barrier_only_submission_count: usize,
    /// Last fence value signaled by each queue that received work this frame
    pub fence_values: Vec<(VelaQueueType, u64)>,
}

impl FrameReport {
    pub fn fence_value(
        &self,
        queue_type: VelaQueueType,
    ) -> Option<u64> {
        self.fence_values
            .iter()
            .find(|(x, _)| *x == queue_type)
            .map(|(_, value)| *value)
    }
}

struct ImportedTexture {
    name: String,
    texture: VelaTexture,
    final_state: VelaResourceState,
}

// A closed command list waiting to be reconciled and submitted
struct RecordedCommandList {
    // None for lists the renderer records itself
    node: Option<RenderGraphNodeId>,
    queue_type: VelaQueueType,
    command_list: VelaCommandList,
    state_tracker: ResourceStateTracker,
}

#[derive(Default)]
struct FrameSubmission {
    cross_queue_wait_count: usize,
    barrier_only_submission_count: usize,
    fence_values: [Option<u64>; 3],
    node_fence_values: FnvHashMap<RenderGraphNodeId, u64>,
}

// Merge a fence value into the set of waits a queue needs, keeping the largest value per producer
// queue. Values signaled by the consumer queue itself are ordered already.
fn add_wait(
    waits: &mut Vec<(VelaQueueType, u64)>,
    consumer_queue: VelaQueueType,
    value: u64,
) {
    let producer_queue = match VelaQueueType::from_fence_value(value) {
        Some(queue_type) if queue_type != consumer_queue => queue_type,
        _ => return,
    };

    match waits.iter_mut().find(|(x, _)| *x == producer_queue) {
        Some(existing) => existing.1 = existing.1.max(value),
        None => waits.push((producer_queue, value)),
    }
}

/// Drives frames: plans the render graph from the registered passes, materializes its resources,
/// records every node into its own command list and submits them with the barriers and
/// cross-queue waits the plan requires.
///
/// Submission is serialized in execution order. For each node the renderer inserts the needed GPU
/// waits, resolves the node's pending barriers against the `GlobalResourceStateTracker` into a
/// barrier-only list (submitted only if a barrier survived elision), submits the node's list and
/// commits its final states.
pub struct Renderer<R> {
    device_context: VelaDeviceContext,
    config: RendererConfig,
    // Indexed by VelaQueueType::index
    queues: Vec<VelaQueue>,
    passes: Vec<Box<dyn RenderPass<R>>>,
    names: NameRegistry,
    global_tracker: GlobalResourceStateTracker,
    command_lists: CommandListPool,
    frame_resources: FrameResourceProvider,
    pipeline_cache: PipelineCache,
    dynamic_descriptors: DynamicDescriptorHeap,
    upload_ring: UploadRingBuffer,
    copy_manager: ResourceCopyManager,
    external_textures: FnvHashMap<Name, ImportedTexture>,
    frame_sync: FrameSync,
    timer: FrameTimer,
    frame_number: u64,
    surface_extents: VelaExtents2D,
    // Fence value of the last submission that touched a resource, until it completes
    resource_queue_uses: FnvHashMap<VelaResourceId, u64>,
    // (consumer, producer) -> largest producer value the consumer has waited for
    waited_values: FnvHashMap<(VelaQueueType, VelaQueueType), u64>,
    last_plan: Option<RenderGraphPlan>,
}

impl<R> Drop for Renderer<R> {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_idle() {
            log::error!("Failed to wait for the GPU while dropping the renderer: {}", e);
        }

        self.last_plan = None;
        self.frame_resources.clear(&mut self.global_tracker);
        self.command_lists.destroy();
        self.pipeline_cache.clear();
    }
}

impl<R> Renderer<R> {
    pub fn new(
        device_context: &VelaDeviceContext,
        config: RendererConfig,
    ) -> VelaResult<Self> {
        config.validate()?;
        log::info!("Creating renderer {:?}", config);

        let queues = VelaQueueType::ALL
            .iter()
            .map(|&queue_type| device_context.create_queue(queue_type))
            .collect::<VelaResult<Vec<_>>>()?;

        let dynamic_descriptors = DynamicDescriptorHeap::new(
            device_context,
            config.dynamic_descriptors_per_frame,
            config.frames_in_flight,
        )?;
        let upload_ring = UploadRingBuffer::new(device_context, config.upload_ring_size)?;

        Ok(Renderer {
            device_context: device_context.clone(),
            queues,
            passes: Default::default(),
            names: NameRegistry::new(),
            global_tracker: GlobalResourceStateTracker::new(),
            command_lists: CommandListPool::new(device_context, MAX_COMMAND_LISTS_PER_QUEUE),
            frame_resources: FrameResourceProvider::new(device_context, &config),
            pipeline_cache: PipelineCache::new(device_context),
            dynamic_descriptors,
            upload_ring,
            copy_manager: ResourceCopyManager::new(),
            external_textures: Default::default(),
            frame_sync: FrameSync::new(config.frames_in_flight),
            timer: FrameTimer::new(),
            frame_number: 0,
            surface_extents: VelaExtents2D::default(),
            resource_queue_uses: Default::default(),
            waited_values: Default::default(),
            last_plan: None,
            config,
        })
    }

    pub fn device_context(&self) -> &VelaDeviceContext {
        &self.device_context
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn queue(
        &self,
        queue_type: VelaQueueType,
    ) -> &VelaQueue {
        &self.queues[queue_type.index()]
    }

    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    pub fn global_tracker(&self) -> &GlobalResourceStateTracker {
        &self.global_tracker
    }

    pub fn frame_resources(&self) -> &FrameResourceProvider {
        &self.frame_resources
    }

    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    pub fn upload_ring(&self) -> &UploadRingBuffer {
        &self.upload_ring
    }

    pub fn copy_manager(&self) -> &ResourceCopyManager {
        &self.copy_manager
    }

    /// The plan of the most recently rendered frame
    pub fn last_plan(&self) -> Option<&RenderGraphPlan> {
        self.last_plan.as_ref()
    }

    /// Number of the most recently started frame. The first frame is 1.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn last_completed_frame(&self) -> u64 {
        self.frame_sync.last_completed_frame()
    }

    pub fn surface_extents(&self) -> VelaExtents2D {
        self.surface_extents
    }

    /// Resources declared with `RenderGraphExtents::MatchSurface` are created at this size
    pub fn set_surface_extents(
        &mut self,
        surface_extents: VelaExtents2D,
    ) {
        self.surface_extents = surface_extents;
    }

    /// Passes are planned and recorded in registration order
    pub fn register_pass(
        &mut self,
        pass: Box<dyn RenderPass<R>>,
    ) {
        log::debug!("Registered pass {}", pass.name());
        self.passes.push(pass);
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Make a texture owned outside the renderer (a swapchain image, for example) available to
    /// passes under `name`. It is transitioned back to `final_state` at the end of every frame
    /// that uses it. Importing a different texture under the same name replaces it.
    pub fn import_texture(
        &mut self,
        name: &str,
        texture: &VelaTexture,
        final_state: VelaResourceState,
    ) {
        let name_id = self.names.intern(name);
        self.external_textures.insert(
            name_id,
            ImportedTexture {
                name: name.to_string(),
                texture: texture.clone(),
                final_state,
            },
        );
    }

    pub fn remove_imported_texture(
        &mut self,
        name: &str,
    ) -> bool {
        self.names
            .find(name)
            .and_then(|x| self.external_textures.remove(&x))
            .is_some()
    }

    /// Copy `data` into the buffer registered under `name` (or an alias of it). The copy is
    /// submitted at the start of the next frame, before any node runs.
    pub fn schedule_buffer_upload(
        &mut self,
        name: &str,
        data: &[u8],
    ) -> VelaResult<()> {
        let name_id = self
            .names
            .find(name)
            .ok_or_else(|| format!("Can't upload to {}, no resource has that name", name))?;
        let name_id = self
            .last_plan
            .as_ref()
            .and_then(|x| x.resolve(name_id))
            .unwrap_or(name_id);

        let destination = self.frame_resources.get_buffer(name_id)?;
        let allocation = self.upload_ring.push(data, UPLOAD_ALIGNMENT)?;
        self.copy_manager
            .schedule_buffer_copy(allocation, destination, 0)
    }

    /// Block until the GPU is idle and release everything it was still using
    pub fn wait_for_idle(&mut self) -> VelaResult<()> {
        for queue in &self.queues {
            queue.flush()?;
        }

        let last_completed_frame = self.frame_sync.wait_for_all(&self.queues)?;
        self.retire_completed_frames(last_completed_frame)
    }

    /// Drain the GPU and switch to the new surface size. Surface-sized resources are recreated
    /// on the next frame.
    pub fn resize(
        &mut self,
        surface_extents: VelaExtents2D,
    ) -> VelaResult<()> {
        log::info!(
            "Resizing from {:?} to {:?}",
            self.surface_extents,
            surface_extents
        );
        self.wait_for_idle()?;
        self.surface_extents = surface_extents;
        Ok(())
    }

    //
    // Frame
    //
    #[profiling::function]
    pub fn render_frame(
        &mut self,
        render_data: &R,
    ) -> VelaResult<FrameReport> {
        let frame = self.begin_frame()?;

        let (mut plan, active_passes) = self.plan_frame(render_data)?;
        self.materialize_resources(&plan, frame)?;
        self.create_pipelines(&active_passes)?;

        let mut submission = FrameSubmission::default();
        if let Some(copies) = self.record_scheduled_copies("Frame start copies", frame)? {
            self.submit(&mut plan, copies, &mut submission, frame)?;
        }

        let recorded = self.record_nodes(&plan, &active_passes, render_data, frame)?;
        for recorded in recorded {
            self.submit(&mut plan, recorded, &mut submission, frame)?;
        }

        // Copies scheduled by passes read upload memory that belongs to this frame
        if let Some(copies) = self.record_scheduled_copies("Pass copies", frame)? {
            self.submit(&mut plan, copies, &mut submission, frame)?;
        }

        self.restore_external_states(&mut submission, frame)?;

        let fence_values: Vec<_> = VelaQueueType::ALL
            .iter()
            .filter_map(|&x| submission.fence_values[x.index()].map(|value| (x, value)))
            .collect();
        self.frame_sync.end_frame(frame, fence_values.clone());
        self.upload_ring.finish_frame(frame);

        let report = FrameReport {
            frame_number: frame,
            execution_order: plan
                .nodes_in_execution_order()
                .map(|x| self.names.display(x.name()).to_string())
                .collect(),
            cross_queue_wait_count: submission.cross_queue_wait_count,
            barrier_only_submission_count: submission.barrier_only_submission_count,
            fence_values,
        };
        log::trace!("{:?}", report);

        self.last_plan = Some(plan);
        Ok(report)
    }

    fn retire_completed_frames(
        &mut self,
        last_completed_frame: u64,
    ) -> VelaResult<()> {
        self.command_lists.update(last_completed_frame)?;
        self.frame_resources
            .update(last_completed_frame, &mut self.global_tracker);
        self.upload_ring.retire_frames(last_completed_frame);
        self.copy_manager.retire(last_completed_frame);

        let queues = &self.queues;
        self.resource_queue_uses.retain(|_, value| {
            VelaQueueType::from_fence_value(*value)
                .map_or(false, |x| !queues[x.index()].is_fence_completed(*value))
        });

        Ok(())
    }

    fn begin_frame(&mut self) -> VelaResult<u64> {
        let last_completed_frame = self.frame_sync.throttle(&self.queues)?;
        self.retire_completed_frames(last_completed_frame)?;

        self.frame_number += 1;
        self.timer.update();

        // Throttling guarantees the frame that last used this slot has completed
        let slot = (self.frame_number % self.config.frames_in_flight as u64) as u32;
        self.dynamic_descriptors.begin_frame(slot);

        log::trace!(
            "Begin frame {} (last completed {})",
            self.frame_number,
            last_completed_frame
        );
        Ok(self.frame_number)
    }

    #[profiling::function]
    fn plan_frame(
        &mut self,
        render_data: &R,
    ) -> VelaResult<(RenderGraphPlan, Vec<usize>)> {
        let mut planner = ResourcePlanner::new(&mut self.names);

        let mut external_textures: Vec<_> = self.external_textures.iter().collect();
        external_textures.sort_by_key(|(name, _)| **name);
        for (_, imported) in external_textures {
            let texture_def = imported.texture.texture_def();
            let desc = RenderGraphTextureDesc {
                format: texture_def.format,
                extents: RenderGraphExtents::Custom(texture_def.extents),
                mip_count: texture_def.mip_count,
                array_length: texture_def.array_length,
                clear_value: texture_def.clear_value,
            };
            planner.import_external(&imported.name, RenderGraphResourceDesc::Texture(desc))?;
        }

        // Node index in the planner is the position in active_passes
        let mut active_passes = Vec::with_capacity(self.passes.len());
        for (pass_index, pass) in self.passes.iter_mut().enumerate() {
            if !pass.is_active(render_data) {
                log::trace!("Pass {} is inactive this frame", pass.name());
                continue;
            }

            planner.begin_node(pass.name(), pass.queue_type())?;
            pass.prepare_resources(&mut planner, render_data)?;
            active_passes.push(pass_index);
        }

        let declarations = planner.finish()?;
        let plan = match RenderGraphPlan::new(declarations, &self.names) {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("Render graph for frame {} rejected: {}", self.frame_number, e);
                return Err(e.into());
            }
        };
        plan.log_plan(&self.names);

        Ok((plan, active_passes))
    }

    #[profiling::function]
    fn materialize_resources(
        &mut self,
        plan: &RenderGraphPlan,
        frame: u64,
    ) -> VelaResult<()> {
        for info in plan.resources() {
            if info.lifetime == RenderGraphResourceLifetime::External {
                let imported = self.external_textures.get(&info.name).ok_or_else(|| {
                    format!(
                        "External resource {} has no imported texture",
                        self.names.display(info.name)
                    )
                })?;
                self.frame_resources.import_texture(
                    info.name,
                    &imported.texture,
                    imported.final_state,
                    &mut self.global_tracker,
                    frame,
                )?;
            } else {
                let creation_info = info.creation_info(self.surface_extents);
                self.frame_resources.create_resource(
                    info.name,
                    &creation_info,
                    info.lifetime,
                    &mut self.global_tracker,
                    frame,
                )?;
            }
        }

        self.frame_resources.evict_unused(frame);
        Ok(())
    }

    fn create_pipelines(
        &mut self,
        active_passes: &[usize],
    ) -> VelaResult<()> {
        for &pass_index in active_passes {
            self.passes[pass_index].create_root_signatures(&mut self.pipeline_cache)?;
        }

        for &pass_index in active_passes {
            self.passes[pass_index].create_pipeline_states(&mut self.pipeline_cache)?;
        }

        Ok(())
    }

    //
    // Recording
    //
    fn record_scheduled_copies(
        &mut self,
        marker: &str,
        frame: u64,
    ) -> VelaResult<Option<RecordedCommandList>> {
        if self.copy_manager.scheduled_count() == 0 {
            return Ok(None);
        }

        let mut command_list = self.command_lists.allocate(VelaQueueType::Graphics)?;
        let mut state_tracker = ResourceStateTracker::new();
        command_list.set_marker(marker)?;
        self.copy_manager
            .record_scheduled_copies(&mut state_tracker, &mut command_list, frame)?;
        command_list.close()?;

        Ok(Some(RecordedCommandList {
            node: None,
            queue_type: VelaQueueType::Graphics,
            command_list,
            state_tracker,
        }))
    }

    #[profiling::function]
    fn record_nodes(
        &mut self,
        plan: &RenderGraphPlan,
        active_passes: &[usize],
        render_data: &R,
        frame: u64,
    ) -> VelaResult<Vec<RecordedCommandList>> {
        let mut recorded = Vec::with_capacity(plan.nodes().len());
        for node in plan.nodes_in_execution_order() {
            profiling::scope!("record node");
            let pass_index = active_passes[node.id().index()];
            let mut command_list = self.command_lists.allocate(node.queue_type())?;
            let mut state_tracker = ResourceStateTracker::new();
            command_list.set_marker(self.names.display(node.name()))?;

            for resource_use in node.resource_uses() {
                let resource = self.frame_resources.resource_id(resource_use.key.name)?;
                state_tracker.resource_barrier(
                    resource,
                    resource_use.key.subresource,
                    resource_use.access.resource_state(),
                );
            }
            state_tracker.flush_barriers(&mut command_list)?;

            let mut context = PassRenderContext {
                command_list: &mut command_list,
                state_tracker: &mut state_tracker,
                frame_resources: &self.frame_resources,
                plan,
                names: &self.names,
                upload_ring: &mut self.upload_ring,
                copy_manager: &mut self.copy_manager,
                dynamic_descriptors: &mut self.dynamic_descriptors,
                pipeline_cache: &self.pipeline_cache,
                frame_number: frame,
                node: node.id(),
            };
            self.passes[pass_index].render(render_data, &mut context, &self.timer)?;

            state_tracker.flush_barriers(&mut command_list)?;
            command_list.close()?;

            recorded.push(RecordedCommandList {
                node: Some(node.id()),
                queue_type: node.queue_type(),
                command_list,
                state_tracker,
            });
        }

        Ok(recorded)
    }

    //
    // Submission
    //
    fn insert_waits(
        &mut self,
        queue_type: VelaQueueType,
        waits: &[(VelaQueueType, u64)],
        submission: &mut FrameSubmission,
    ) -> VelaResult<()> {
        let queue = &self.queues[queue_type.index()];
        for &(producer_queue, value) in waits {
            let waited = self
                .waited_values
                .entry((queue_type, producer_queue))
                .or_insert(0);
            if *waited >= value {
                log::trace!(
                    "{:?} already waited for {:?} value {:#x}",
                    queue_type,
                    producer_queue,
                    value
                );
                continue;
            }

            log::trace!(
                "{:?} waits for {:?} value {:#x}",
                queue_type,
                producer_queue,
                value
            );
            queue.insert_wait(value)?;
            *waited = value;
            submission.cross_queue_wait_count += 1;
        }

        Ok(())
    }

    fn resource_waits(
        &self,
        queue_type: VelaQueueType,
        resources: &[VelaResourceId],
        waits: &mut Vec<(VelaQueueType, u64)>,
    ) {
        for resource in resources {
            if let Some(&value) = self.resource_queue_uses.get(resource) {
                add_wait(waits, queue_type, value);
            }
        }
    }

    fn finish_submission(
        &mut self,
        queue_type: VelaQueueType,
        resources: Vec<VelaResourceId>,
        fence_value: u64,
        submission: &mut FrameSubmission,
    ) {
        for resource in resources {
            self.resource_queue_uses.insert(resource, fence_value);
        }

        submission.fence_values[queue_type.index()] = Some(fence_value);
    }

    #[profiling::function]
    fn submit(
        &mut self,
        plan: &mut RenderGraphPlan,
        recorded: RecordedCommandList,
        submission: &mut FrameSubmission,
        frame: u64,
    ) -> VelaResult<()> {
        let RecordedCommandList {
            node,
            queue_type,
            mut command_list,
            mut state_tracker,
        } = recorded;
        let resources = state_tracker.touched_resources();

        let mut waits = Vec::default();
        if let Some(node_id) = node {
            for producer in &plan.node(node_id).relations().nodes_to_sync_with {
                if let Some(&value) = submission.node_fence_values.get(producer) {
                    add_wait(&mut waits, queue_type, value);
                }
            }
        }

        // Work from earlier submissions (including previous frames) on other queues
        self.resource_waits(queue_type, &resources, &mut waits);
        waits.sort();
        self.insert_waits(queue_type, &waits, submission)?;
        if let Some(node_id) = node {
            plan.set_synchronization_index_set(node_id, waits);
        }

        let queue = self.queues[queue_type.index()].clone();
        if state_tracker.pending_barrier_count() > 0 {
            let mut barrier_list = self.command_lists.allocate(queue_type)?;
            let barrier_count =
                state_tracker.flush_pending_barriers(&self.global_tracker, &mut barrier_list)?;
            if barrier_count > 0 {
                queue.execute_command_list(&mut barrier_list)?;
                submission.barrier_only_submission_count += 1;
            }
            self.command_lists.retire(barrier_list, frame);
        }

        let fence_value = queue.execute_command_list(&mut command_list)?;
        state_tracker.commit_final_resource_states(&mut self.global_tracker);
        self.command_lists.retire(command_list, frame);

        if let Some(node_id) = node {
            submission.node_fence_values.insert(node_id, fence_value);
        }
        self.finish_submission(queue_type, resources, fence_value, submission);
        Ok(())
    }

    // Put every imported resource used this frame back into the state its owner expects
    fn restore_external_states(
        &mut self,
        submission: &mut FrameSubmission,
        frame: u64,
    ) -> VelaResult<()> {
        let external_resources = self.frame_resources.external_resources(frame);
        if external_resources.is_empty() {
            return Ok(());
        }

        let mut state_tracker = ResourceStateTracker::new();
        for external in &external_resources {
            for subresource in 0..external.subresource_count {
                state_tracker.resource_barrier(
                    external.resource,
                    subresource,
                    external.final_state,
                );
            }
        }

        let queue_type = VelaQueueType::Graphics;
        let resources = state_tracker.touched_resources();
        let mut command_list = self.command_lists.allocate(queue_type)?;
        let barrier_count =
            state_tracker.flush_pending_barriers(&self.global_tracker, &mut command_list)?;
        if barrier_count > 0 {
            let mut waits = Vec::default();
            self.resource_waits(queue_type, &resources, &mut waits);
            waits.sort();
            self.insert_waits(queue_type, &waits, submission)?;

            let fence_value =
                self.queues[queue_type.index()].execute_command_list(&mut command_list)?;
            submission.barrier_only_submission_count += 1;
            self.finish_submission(queue_type, resources, fence_value, submission);
        }

        state_tracker.commit_final_resource_states(&mut self.global_tracker);
        self.command_lists.retire(command_list, frame);
        Ok(())
    }
}

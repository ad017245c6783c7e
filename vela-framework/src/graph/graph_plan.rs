use super::{
    resolve_alias, RenderGraphDeclarations, RenderGraphDependencyReason, RenderGraphError,
    RenderGraphNode, RenderGraphNodeId, RenderGraphResourceInfo, RenderGraphResourceKey,
};
use fnv::FnvHashMap;
use vela_api::VelaQueueType;
use vela_base::{Name, NameRegistry};

fn key_display(
    names: &NameRegistry,
    key: RenderGraphResourceKey,
) -> String {
    if key.subresource == 0 {
        names.display(key.name).to_string()
    } else {
        format!("{}[{}]", names.display(key.name), key.subresource)
    }
}

// Depth-first walk over dependencies. Every node lands in ordered_list after all of its
// dependencies.
fn visit_node(
    nodes: &[RenderGraphNode],
    names: &NameRegistry,
    node_id: RenderGraphNodeId,
    visited: &mut Vec<bool>,
    visiting: &mut Vec<bool>,
    visiting_stack: &mut Vec<RenderGraphNodeId>,
    ordered_list: &mut Vec<RenderGraphNodeId>,
) -> Result<(), RenderGraphError> {
    // This node is already visited and inserted into ordered_list
    if visited[node_id.0] {
        return Ok(());
    }

    // This node is already being visited higher up in the stack. This indicates a cycle in the
    // graph
    if visiting[node_id.0] {
        let cycle_start = visiting_stack
            .iter()
            .position(|x| *x == node_id)
            .unwrap_or(0);
        let cycle = &visiting_stack[cycle_start..];

        let mut resources = Vec::default();
        for (i, consumer) in cycle.iter().enumerate() {
            // Each node on the stack is visiting the next one as a dependency
            let producer = cycle.get(i + 1).copied().unwrap_or(node_id);
            for reason in &nodes[consumer.0].relations.dependency_reasons {
                let resource = key_display(names, reason.resource);
                if reason.producer == producer && !resources.contains(&resource) {
                    resources.push(resource);
                }
            }
        }

        let node_names: Vec<String> = cycle
            .iter()
            .chain(std::iter::once(&node_id))
            .map(|x| names.display(nodes[x.0].name).to_string())
            .collect();

        log::warn!(
            "Found cycle in graph: {} via {:?}",
            node_names.join(" -> "),
            resources
        );
        return Err(RenderGraphError::Cycle {
            nodes: node_names,
            resources,
        });
    }

    visiting[node_id.0] = true;
    visiting_stack.push(node_id);

    for &dependency in &nodes[node_id.0].relations.dependencies {
        visit_node(
            nodes,
            names,
            dependency,
            visited,
            visiting,
            visiting_stack,
            ordered_list,
        )?;
    }

    visiting_stack.pop();
    visiting[node_id.0] = false;
    visited[node_id.0] = true;
    ordered_list.push(node_id);

    Ok(())
}

/// Derive the dependencies of every node from the order of its declarations.
///
/// A read depends on the most recent earlier writer of the same key. If there is none the key
/// either holds data from before the frame (persistent and external resources) or is produced by
/// the last writer of the frame, which turns into a forward edge. A write depends on the previous
/// writer and on every reader since that writer.
fn determine_dependencies(
    nodes: &mut [RenderGraphNode],
    resources: &[RenderGraphResourceInfo],
    resource_indices: &FnvHashMap<Name, usize>,
    names: &NameRegistry,
) -> Result<(), RenderGraphError> {
    let mut final_writers = FnvHashMap::<RenderGraphResourceKey, RenderGraphNodeId>::default();
    for node in nodes.iter() {
        for write in &node.writes {
            final_writers.insert(write.key, node.id);
        }
    }

    let mut last_writers = FnvHashMap::<RenderGraphResourceKey, RenderGraphNodeId>::default();
    let mut readers_since_write =
        FnvHashMap::<RenderGraphResourceKey, Vec<RenderGraphNodeId>>::default();

    for node in nodes.iter_mut() {
        let mut reasons = Vec::<RenderGraphDependencyReason>::default();
        let mut add_reason = |producer: RenderGraphNodeId, resource: RenderGraphResourceKey| {
            let reason = RenderGraphDependencyReason { producer, resource };
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        };

        for read in &node.reads {
            if let Some(&writer) = last_writers.get(&read.key) {
                add_reason(writer, read.key);
            } else {
                let info = &resources[resource_indices[&read.key.name]];
                if !info.lifetime.has_frame_start_contents() {
                    match final_writers.get(&read.key) {
                        Some(&writer) if writer != node.id => {
                            log::trace!(
                                "  node {} reads {} before it is written, producer is {:?}",
                                names.display(node.name),
                                key_display(names, read.key),
                                writer
                            );
                            add_reason(writer, read.key);
                            continue;
                        }
                        _ => {
                            return Err(RenderGraphError::NoProducer {
                                node: names.display(node.name).to_string(),
                                resource: key_display(names, read.key),
                            });
                        }
                    }
                }
            }

            readers_since_write.entry(read.key).or_default().push(node.id);
        }

        for write in &node.writes {
            if let Some(&writer) = last_writers.get(&write.key) {
                if writer != node.id {
                    add_reason(writer, write.key);
                }
            }

            if let Some(readers) = readers_since_write.get(&write.key) {
                for &reader in readers {
                    if reader != node.id {
                        add_reason(reader, write.key);
                    }
                }
            }
        }

        for write in &node.writes {
            last_writers.insert(write.key, node.id);
            readers_since_write.remove(&write.key);
        }

        let mut dependencies: Vec<_> = reasons.iter().map(|x| x.producer).collect();
        dependencies.sort();
        dependencies.dedup();

        node.relations.dependencies = dependencies;
        node.relations.dependency_reasons = reasons;
    }

    Ok(())
}

/// The schedule for one frame: every node with its relations, the order to record them in, and
/// the canonical resource table
#[derive(Debug)]
pub struct RenderGraphPlan {
    nodes: Vec<RenderGraphNode>,
    execution_order: Vec<RenderGraphNodeId>,
    resources: Vec<RenderGraphResourceInfo>,
    resource_indices: FnvHashMap<Name, usize>,
    aliases: FnvHashMap<Name, Name>,
}

impl RenderGraphPlan {
    #[profiling::function]
    pub fn new(
        declarations: RenderGraphDeclarations,
        names: &NameRegistry,
    ) -> Result<RenderGraphPlan, RenderGraphError> {
        let RenderGraphDeclarations {
            mut nodes,
            resources,
            resource_indices,
            aliases,
        } = declarations;

        for (index, node) in nodes.iter_mut().enumerate() {
            node.relations.original_index = index;
        }

        log::trace!("Determine dependencies");
        determine_dependencies(&mut nodes, &resources, &resource_indices, names)?;

        //
        // Topological order, dependencies first
        //
        let mut visited = vec![false; nodes.len()];
        let mut visiting = vec![false; nodes.len()];
        let mut visiting_stack = Vec::default();
        let mut ordered_list = Vec::with_capacity(nodes.len());
        for index in 0..nodes.len() {
            visit_node(
                &nodes,
                names,
                RenderGraphNodeId(index),
                &mut visited,
                &mut visiting,
                &mut visiting_stack,
                &mut ordered_list,
            )?;
        }

        //
        // Layers. ordered_list puts every dependency before its dependents so a single pass
        // is enough.
        //
        for (ordered_index, &node_id) in ordered_list.iter().enumerate() {
            let layer = nodes[node_id.0]
                .relations
                .dependencies
                .iter()
                .map(|x| nodes[x.0].relations.layer + 1)
                .max()
                .unwrap_or(0);

            let relations = &mut nodes[node_id.0].relations;
            relations.layer = layer;
            relations.ordered_index = ordered_index;
        }

        let mut execution_order = ordered_list;
        execution_order.sort_by_key(|x| {
            let relations = &nodes[x.0].relations;
            (relations.layer, relations.original_index)
        });

        for (execution_index, &node_id) in execution_order.iter().enumerate() {
            nodes[node_id.0].relations.execution_index = execution_index;
        }

        //
        // Cross-queue synchronization
        //
        for index in 0..nodes.len() {
            let queue_type = nodes[index].queue_type;
            let mut nodes_to_sync_with = Vec::default();
            let mut sync_reasons = Vec::default();
            for reason in &nodes[index].relations.dependency_reasons {
                if nodes[reason.producer.0].queue_type != queue_type {
                    if !nodes_to_sync_with.contains(&reason.producer) {
                        nodes_to_sync_with.push(reason.producer);
                    }
                    sync_reasons.push(*reason);
                }
            }

            nodes_to_sync_with.sort();
            let relations = &mut nodes[index].relations;
            relations.sync_required = !nodes_to_sync_with.is_empty();
            relations.nodes_to_sync_with = nodes_to_sync_with;
            relations.sync_reasons = sync_reasons;
        }

        Ok(RenderGraphPlan {
            nodes,
            execution_order,
            resources,
            resource_indices,
            aliases,
        })
    }

    pub fn nodes(&self) -> &[RenderGraphNode] {
        &self.nodes
    }

    pub fn node(
        &self,
        node_id: RenderGraphNodeId,
    ) -> &RenderGraphNode {
        &self.nodes[node_id.0]
    }

    pub fn find_node(
        &self,
        name: Name,
    ) -> Option<RenderGraphNodeId> {
        self.nodes.iter().find(|x| x.name == name).map(|x| x.id)
    }

    pub fn execution_order(&self) -> &[RenderGraphNodeId] {
        &self.execution_order
    }

    pub fn nodes_in_execution_order(&self) -> impl Iterator<Item = &RenderGraphNode> {
        self.execution_order.iter().map(move |x| &self.nodes[x.0])
    }

    pub fn layer_count(&self) -> u32 {
        self.nodes
            .iter()
            .map(|x| x.relations.layer + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn resources(&self) -> &[RenderGraphResourceInfo] {
        &self.resources
    }

    /// Look up a resource by any of its names
    pub fn resource(
        &self,
        name: Name,
    ) -> Option<&RenderGraphResourceInfo> {
        let canonical = self.resolve(name)?;
        Some(&self.resources[self.resource_indices[&canonical]])
    }

    /// Map an alias to the canonical resource name. Canonical names map to themselves.
    pub fn resolve(
        &self,
        name: Name,
    ) -> Option<Name> {
        resolve_alias(name, &self.aliases, &self.resource_indices)
    }

    pub(crate) fn set_synchronization_index_set(
        &mut self,
        node_id: RenderGraphNodeId,
        synchronization_index_set: Vec<(VelaQueueType, u64)>,
    ) {
        self.nodes[node_id.0].relations.synchronization_index_set = synchronization_index_set;
    }

    /// Dump the schedule at debug level
    pub fn log_plan(
        &self,
        names: &NameRegistry,
    ) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }

        log::debug!(
            "Render graph plan: {} nodes, {} resources, {} layers",
            self.nodes.len(),
            self.resources.len(),
            self.layer_count()
        );
        for node in self.nodes_in_execution_order() {
            let relations = node.relations();
            log::debug!(
                "  [{}] {} on {:?} layer {}",
                relations.execution_index,
                names.display(node.name),
                node.queue_type,
                relations.layer
            );
            for resource_use in node.resource_uses() {
                log::debug!(
                    "    {:?} {}",
                    resource_use.access,
                    key_display(names, resource_use.key)
                );
            }
            for reason in &relations.dependency_reasons {
                log::debug!(
                    "    after {} because of {}",
                    names.display(self.nodes[reason.producer.0].name),
                    key_display(names, reason.resource)
                );
            }
            for reason in &relations.sync_reasons {
                log::debug!(
                    "    waits for {} on {:?} because of {}",
                    names.display(self.nodes[reason.producer.0].name),
                    self.nodes[reason.producer.0].queue_type,
                    key_display(names, reason.resource)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        RenderGraphBufferDesc, RenderGraphExtents, RenderGraphTextureDesc, ResourcePlanner,
    };
    use vela_api::{VelaExtents3D, VelaFormat};

    fn color() -> RenderGraphTextureDesc {
        RenderGraphTextureDesc::new(VelaFormat::R8G8B8A8_UNORM)
    }

    fn depth() -> RenderGraphTextureDesc {
        RenderGraphTextureDesc::new(VelaFormat::D32_SFLOAT)
    }

    fn plan<F: FnOnce(&mut ResourcePlanner) -> Result<(), RenderGraphError>>(
        names: &mut NameRegistry,
        f: F,
    ) -> Result<RenderGraphPlan, RenderGraphError> {
        let mut planner = ResourcePlanner::new(names);
        f(&mut planner)?;
        let declarations = planner.finish()?;
        RenderGraphPlan::new(declarations, names)
    }

    fn execution_names(
        plan: &RenderGraphPlan,
        names: &NameRegistry,
    ) -> Vec<String> {
        plan.nodes_in_execution_order()
            .map(|x| names.display(x.name()).to_string())
            .collect()
    }

    fn node_named<'a>(
        plan: &'a RenderGraphPlan,
        names: &NameRegistry,
        name: &str,
    ) -> &'a RenderGraphNode {
        plan.node(plan.find_node(names.find(name).unwrap()).unwrap())
    }

    #[test]
    fn test_depth_forward_tonemap() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Depth", VelaQueueType::Graphics)?;
            planner.new_depth_stencil("DepthBuffer", depth())?;
            planner.begin_node("Forward", VelaQueueType::Graphics)?;
            planner.read_texture("DepthBuffer")?;
            planner.new_render_target("ColorBuffer", color())?;
            planner.begin_node("Tonemap", VelaQueueType::Graphics)?;
            planner.read_texture("ColorBuffer")?;
            planner.new_render_target("Output", color())?;
            Ok(())
        })
        .unwrap();

        plan.log_plan(&names);
        assert_eq!(
            execution_names(&plan, &names),
            vec!["Depth", "Forward", "Tonemap"]
        );
        assert_eq!(plan.layer_count(), 3);
        assert!(plan.nodes().iter().all(|x| !x.relations().sync_required));
    }

    #[test]
    fn test_planning_is_deterministic() {
        fn declare(planner: &mut ResourcePlanner<'_>) -> Result<(), RenderGraphError> {
            planner.begin_node("Shadows", VelaQueueType::Graphics)?;
            planner.new_depth_stencil("ShadowMap", depth())?;
            planner.begin_node("Simulate", VelaQueueType::Compute)?;
            planner.new_buffer("Particles", RenderGraphBufferDesc { size: 256 })?;
            planner.begin_node("Lighting", VelaQueueType::Graphics)?;
            planner.read_texture("ShadowMap")?;
            planner.read_buffer("Particles")?;
            planner.new_render_target("Lit", color())?;
            Ok(())
        }

        let mut names = NameRegistry::new();
        let first = plan(&mut names, declare).unwrap();
        let second = plan(&mut names, declare).unwrap();
        assert_eq!(first.execution_order(), second.execution_order());
        for (a, b) in first.nodes().iter().zip(second.nodes()) {
            assert_eq!(a.relations(), b.relations());
        }
    }

    #[test]
    fn test_order_is_independent_of_declaration_order() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Tonemap", VelaQueueType::Graphics)?;
            planner.read_texture("ColorBuffer")?;
            planner.new_render_target("Output", color())?;
            planner.begin_node("Forward", VelaQueueType::Graphics)?;
            planner.read_texture("DepthBuffer")?;
            planner.new_render_target("ColorBuffer", color())?;
            planner.begin_node("Depth", VelaQueueType::Graphics)?;
            planner.new_depth_stencil("DepthBuffer", depth())?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            execution_names(&plan, &names),
            vec!["Depth", "Forward", "Tonemap"]
        );
    }

    #[test]
    fn test_independent_nodes_keep_declaration_order() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Shadows", VelaQueueType::Graphics)?;
            planner.new_depth_stencil("ShadowMap", depth())?;
            planner.begin_node("GBuffer", VelaQueueType::Graphics)?;
            planner.new_render_target("Albedo", color())?;
            planner.begin_node("Lighting", VelaQueueType::Graphics)?;
            planner.read_texture("Albedo")?;
            planner.read_texture("ShadowMap")?;
            planner.new_render_target("Lit", color())?;
            Ok(())
        })
        .unwrap();

        let shadows = node_named(&plan, &names, "Shadows");
        let gbuffer = node_named(&plan, &names, "GBuffer");
        assert_eq!(shadows.relations().layer, 0);
        assert_eq!(gbuffer.relations().layer, 0);
        assert_eq!(
            execution_names(&plan, &names),
            vec!["Shadows", "GBuffer", "Lighting"]
        );
    }

    #[test]
    fn test_read_depends_on_most_recent_writer() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Clear", VelaQueueType::Graphics)?;
            planner.new_render_target("Color", color())?;
            planner.begin_node("Draw", VelaQueueType::Graphics)?;
            planner.write_render_target("Color", None)?;
            planner.begin_node("Present", VelaQueueType::Graphics)?;
            planner.read_texture("Color")?;
            planner.new_render_target("Output", color())?;
            Ok(())
        })
        .unwrap();

        let clear = node_named(&plan, &names, "Clear").id();
        let draw = node_named(&plan, &names, "Draw");
        let present = node_named(&plan, &names, "Present");
        assert_eq!(present.relations().dependencies, vec![draw.id()]);
        // Write after write
        assert_eq!(draw.relations().dependencies, vec![clear]);
    }

    #[test]
    fn test_write_waits_for_earlier_readers() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Produce", VelaQueueType::Graphics)?;
            planner.new_render_target("Color", color())?;
            planner.begin_node("Sample", VelaQueueType::Graphics)?;
            planner.read_texture("Color")?;
            planner.new_render_target("Copy", color())?;
            planner.begin_node("Overwrite", VelaQueueType::Graphics)?;
            planner.write_render_target("Color", None)?;
            Ok(())
        })
        .unwrap();

        let produce = node_named(&plan, &names, "Produce").id();
        let sample = node_named(&plan, &names, "Sample").id();
        let overwrite = node_named(&plan, &names, "Overwrite");
        assert_eq!(overwrite.relations().dependencies, vec![produce, sample]);
        assert_eq!(
            execution_names(&plan, &names),
            vec!["Produce", "Sample", "Overwrite"]
        );
    }

    #[test]
    fn test_aliased_writes_share_a_resource() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Blur0", VelaQueueType::Graphics)?;
            planner.new_render_target("BlurA", color())?;
            planner.begin_node("Blur1", VelaQueueType::Graphics)?;
            planner.write_render_target("BlurB", Some("BlurA"))?;
            planner.begin_node("Composite", VelaQueueType::Graphics)?;
            planner.read_texture("BlurB")?;
            planner.new_render_target("Output", color())?;
            Ok(())
        })
        .unwrap();

        let blur_a = names.find("BlurA").unwrap();
        let blur_b = names.find("BlurB").unwrap();
        assert_eq!(plan.resolve(blur_b), Some(blur_a));
        assert_eq!(plan.resource(blur_b).unwrap().name, blur_a);
        assert_eq!(plan.resources().len(), 2);

        let blur1 = node_named(&plan, &names, "Blur1").id();
        let composite = node_named(&plan, &names, "Composite");
        assert_eq!(composite.relations().dependencies, vec![blur1]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut names = NameRegistry::new();
        let result = plan(&mut names, |planner| {
            planner.begin_node("A", VelaQueueType::Graphics)?;
            planner.read_texture("Y")?;
            planner.new_render_target("X", color())?;
            planner.begin_node("B", VelaQueueType::Graphics)?;
            planner.read_texture("X")?;
            planner.new_render_target("Y", color())?;
            Ok(())
        });

        match result {
            Err(RenderGraphError::Cycle { nodes, resources }) => {
                assert!(nodes.contains(&"A".to_string()));
                assert!(nodes.contains(&"B".to_string()));
                assert!(resources.contains(&"X".to_string()));
                assert!(resources.contains(&"Y".to_string()));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_transient_read_without_producer() {
        let mut names = NameRegistry::new();
        let result = plan(&mut names, |planner| {
            planner.begin_node("Feedback", VelaQueueType::Graphics)?;
            planner.read_texture("Color")?;
            planner.new_render_target("Color", color())?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(RenderGraphError::NoProducer { .. })
        ));
    }

    #[test]
    fn test_persistent_read_needs_no_producer() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Taa", VelaQueueType::Graphics)?;
            planner.new_persistent_texture(
                "History",
                color().with_extents(RenderGraphExtents::Custom(VelaExtents3D {
                    width: 64,
                    height: 64,
                    depth: 1,
                })),
            )?;
            planner.read_texture("History")?;
            planner.new_render_target("Resolved", color())?;
            planner.begin_node("StoreHistory", VelaQueueType::Graphics)?;
            planner.read_texture("Resolved")?;
            planner.write_render_target("History", None)?;
            Ok(())
        })
        .unwrap();

        let taa = node_named(&plan, &names, "Taa");
        let store = node_named(&plan, &names, "StoreHistory");
        assert!(taa.relations().dependencies.is_empty());
        assert_eq!(store.relations().dependencies, vec![taa.id()]);
    }

    #[test]
    fn test_cross_queue_dependency_requires_sync() {
        let mut names = NameRegistry::new();
        let plan = plan(&mut names, |planner| {
            planner.begin_node("Simulate", VelaQueueType::Compute)?;
            planner.new_buffer("Particles", RenderGraphBufferDesc { size: 4096 })?;
            planner.begin_node("DrawParticles", VelaQueueType::Graphics)?;
            planner.read_buffer("Particles")?;
            planner.new_render_target("Color", color())?;
            Ok(())
        })
        .unwrap();

        let simulate = node_named(&plan, &names, "Simulate");
        let draw = node_named(&plan, &names, "DrawParticles");
        assert!(!simulate.relations().sync_required);
        assert!(draw.relations().sync_required);
        assert_eq!(draw.relations().nodes_to_sync_with, vec![simulate.id()]);
        assert_eq!(draw.relations().sync_reasons.len(), 1);
    }
}

use super::{
    RenderGraphAccess, RenderGraphAliasedWrite, RenderGraphBufferDesc, RenderGraphError,
    RenderGraphNode, RenderGraphNodeId, RenderGraphResourceDesc, RenderGraphResourceInfo,
    RenderGraphResourceKey, RenderGraphResourceLifetime, RenderGraphResourceUse,
    RenderGraphTextureDesc, RelationsInGraph,
};
use fnv::{FnvHashMap, FnvHashSet};
use vela_api::{VelaQueueType, VelaResourceUsage};
use vela_base::{Name, NameRegistry};

/// Follow the alias chain starting at `name` until a declared resource is found. Returns `None`
/// if the chain ends at a name that was never declared.
pub(crate) fn resolve_alias(
    name: Name,
    aliases: &FnvHashMap<Name, Name>,
    resource_indices: &FnvHashMap<Name, usize>,
) -> Option<Name> {
    let mut current = name;
    // Each step consumes one alias edge, so a longer walk can only mean a cycle
    for _ in 0..=aliases.len() {
        if resource_indices.contains_key(&current) {
            return Some(current);
        }

        current = *aliases.get(&current)?;
    }

    None
}

#[derive(Copy, Clone, Debug)]
struct PlannedUse {
    name: Name,
    subresource: u32,
    access: RenderGraphAccess,
}

#[derive(Debug)]
struct PlannedNode {
    name: Name,
    queue_type: VelaQueueType,
    reads: Vec<PlannedUse>,
    writes: Vec<PlannedUse>,
    aliased_writes: Vec<RenderGraphAliasedWrite>,
}

/// Output of a `ResourcePlanner`: every node with canonical resource keys, and the table of
/// resources to materialize
#[derive(Debug)]
pub struct RenderGraphDeclarations {
    pub(crate) nodes: Vec<RenderGraphNode>,
    pub(crate) resources: Vec<RenderGraphResourceInfo>,
    pub(crate) resource_indices: FnvHashMap<Name, usize>,
    pub(crate) aliases: FnvHashMap<Name, Name>,
}

/// The declaration surface handed to passes while the frame is being planned.
///
/// `begin_node` starts a node. Every declaration after it belongs to that node until the next
/// `begin_node`. `New*` declares a resource and writes it. `Write*` writes an existing resource,
/// or introduces an alias of `original` if the name is new. `Read*` reads. Reads are resolved in
/// `finish`, so a node may read a name that a later node declares.
pub struct ResourcePlanner<'a> {
    names: &'a mut NameRegistry,
    nodes: Vec<PlannedNode>,
    node_names: FnvHashSet<Name>,
    resources: Vec<RenderGraphResourceInfo>,
    resource_indices: FnvHashMap<Name, usize>,
    aliases: FnvHashMap<Name, Name>,
}

impl<'a> ResourcePlanner<'a> {
    pub fn new(names: &'a mut NameRegistry) -> Self {
        ResourcePlanner {
            names,
            nodes: Default::default(),
            node_names: Default::default(),
            resources: Default::default(),
            resource_indices: Default::default(),
            aliases: Default::default(),
        }
    }

    pub fn names(&self) -> &NameRegistry {
        &*self.names
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Start declaring a new node. Node names must be unique within a frame.
    pub fn begin_node(
        &mut self,
        name: &str,
        queue_type: VelaQueueType,
    ) -> Result<RenderGraphNodeId, RenderGraphError> {
        let name_id = self.names.intern(name);
        if !self.node_names.insert(name_id) {
            return Err(RenderGraphError::DuplicateNode {
                node: name.to_string(),
            });
        }

        let id = RenderGraphNodeId(self.nodes.len());
        self.nodes.push(PlannedNode {
            name: name_id,
            queue_type,
            reads: Default::default(),
            writes: Default::default(),
            aliased_writes: Default::default(),
        });

        Ok(id)
    }

    /// Resolve a name through its alias chain to the canonical resource name
    pub fn resolve(
        &self,
        name: &str,
    ) -> Option<Name> {
        let name = self.names.find(name)?;
        self.resolve_name(name)
    }

    fn resolve_name(
        &self,
        name: Name,
    ) -> Option<Name> {
        resolve_alias(name, &self.aliases, &self.resource_indices)
    }

    fn current_node_index(
        &self,
        resource: &str,
    ) -> Result<usize, RenderGraphError> {
        if self.nodes.is_empty() {
            Err(RenderGraphError::NoActiveNode {
                resource: resource.to_string(),
            })
        } else {
            Ok(self.nodes.len() - 1)
        }
    }

    fn node_display_name(
        &self,
        node_index: usize,
    ) -> String {
        self.names.display(self.nodes[node_index].name).to_string()
    }

    //
    // Resource declarations
    //
    fn declare_resource(
        &mut self,
        name: &str,
        desc: RenderGraphResourceDesc,
        lifetime: RenderGraphResourceLifetime,
        usage: VelaResourceUsage,
    ) -> Result<Name, RenderGraphError> {
        let name_id = self.names.intern(name);
        let canonical = self.resolve_name(name_id).unwrap_or(name_id);

        if let Some(&index) = self.resource_indices.get(&canonical) {
            let resource = &mut self.resources[index];
            if resource.desc != desc || resource.lifetime != lifetime {
                return Err(RenderGraphError::ConflictingDescription {
                    resource: name.to_string(),
                });
            }

            resource.usage |= usage;
        } else {
            log::trace!("Declared {:?} resource {}: {:?}", lifetime, name, desc);
            self.resource_indices
                .insert(canonical, self.resources.len());
            self.resources.push(RenderGraphResourceInfo {
                name: canonical,
                desc,
                usage,
                lifetime,
            });
        }

        Ok(canonical)
    }

    fn new_resource(
        &mut self,
        name: &str,
        desc: RenderGraphResourceDesc,
        access: RenderGraphAccess,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        let node_index = self.current_node_index(name)?;
        if !access.is_valid_for(&desc) {
            return Err(RenderGraphError::WrongResourceType {
                node: self.node_display_name(node_index),
                resource: name.to_string(),
                access,
            });
        }

        let canonical = self.declare_resource(
            name,
            desc,
            RenderGraphResourceLifetime::Transient,
            access.required_usage(),
        )?;

        self.nodes[node_index].writes.push(PlannedUse {
            name: canonical,
            subresource: 0,
            access,
        });

        Ok(RenderGraphResourceKey::new(canonical, 0))
    }

    /// Declare a transient color target and write it as a render target
    pub fn new_render_target(
        &mut self,
        name: &str,
        desc: RenderGraphTextureDesc,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.new_resource(
            name,
            RenderGraphResourceDesc::Texture(desc),
            RenderGraphAccess::RenderTarget,
        )
    }

    /// Declare a transient depth buffer and write it as a depth target
    pub fn new_depth_stencil(
        &mut self,
        name: &str,
        desc: RenderGraphTextureDesc,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.new_resource(
            name,
            RenderGraphResourceDesc::Texture(desc),
            RenderGraphAccess::DepthWrite,
        )
    }

    /// Declare a transient texture and write it through an unordered access view
    pub fn new_texture(
        &mut self,
        name: &str,
        desc: RenderGraphTextureDesc,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.new_resource(
            name,
            RenderGraphResourceDesc::Texture(desc),
            RenderGraphAccess::UnorderedAccess,
        )
    }

    /// Declare a transient buffer and write it through an unordered access view
    pub fn new_buffer(
        &mut self,
        name: &str,
        desc: RenderGraphBufferDesc,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.new_resource(
            name,
            RenderGraphResourceDesc::Buffer(desc),
            RenderGraphAccess::UnorderedAccess,
        )
    }

    /// Declare a texture whose contents survive from one frame to the next. Reading it needs no
    /// writer in the frame. Does not declare an access by itself.
    pub fn new_persistent_texture(
        &mut self,
        name: &str,
        desc: RenderGraphTextureDesc,
    ) -> Result<Name, RenderGraphError> {
        self.declare_resource(
            name,
            RenderGraphResourceDesc::Texture(desc),
            RenderGraphResourceLifetime::Persistent,
            VelaResourceUsage::empty(),
        )
    }

    /// Declare a buffer whose contents survive from one frame to the next
    pub fn new_persistent_buffer(
        &mut self,
        name: &str,
        desc: RenderGraphBufferDesc,
    ) -> Result<Name, RenderGraphError> {
        self.declare_resource(
            name,
            RenderGraphResourceDesc::Buffer(desc),
            RenderGraphResourceLifetime::Persistent,
            VelaResourceUsage::empty(),
        )
    }

    /// Make a resource owned outside the graph visible to this frame's nodes
    pub fn import_external(
        &mut self,
        name: &str,
        desc: RenderGraphResourceDesc,
    ) -> Result<Name, RenderGraphError> {
        self.declare_resource(
            name,
            desc,
            RenderGraphResourceLifetime::External,
            VelaResourceUsage::empty(),
        )
    }

    //
    // Writes
    //
    /// Write `name`. If `original` is given and `name` is new, `name` becomes an alias of
    /// `original` and resolves to the same physical resource.
    pub fn write(
        &mut self,
        name: &str,
        subresource: u32,
        original: Option<&str>,
        access: RenderGraphAccess,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        let node_index = self.current_node_index(name)?;
        let name_id = self.names.intern(name);

        if let Some(original) = original {
            if original == name {
                return Err(RenderGraphError::SelfAlias {
                    node: self.node_display_name(node_index),
                    resource: name.to_string(),
                });
            }

            let original_id = self.names.intern(original);
            let original_canonical =
                self.resolve_name(original_id)
                    .ok_or_else(|| RenderGraphError::MissingResource {
                        node: self.node_display_name(node_index),
                        resource: original.to_string(),
                    })?;

            match self.resolve_name(name_id) {
                Some(existing) if existing != original_canonical => {
                    return Err(RenderGraphError::AliasConflict {
                        resource: name.to_string(),
                        existing: self.names.display(existing).to_string(),
                        requested: self.names.display(original_canonical).to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    log::trace!("{} is an alias of {}", name, original);
                    self.aliases.insert(name_id, original_id);
                }
            }

            self.nodes[node_index]
                .aliased_writes
                .push(RenderGraphAliasedWrite {
                    alias: name_id,
                    original: RenderGraphResourceKey::new(original_canonical, subresource),
                });
        }

        self.nodes[node_index].writes.push(PlannedUse {
            name: name_id,
            subresource,
            access,
        });

        let canonical = self.resolve_name(name_id).unwrap_or(name_id);
        Ok(RenderGraphResourceKey::new(canonical, subresource))
    }

    pub fn write_render_target(
        &mut self,
        name: &str,
        original: Option<&str>,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.write(name, 0, original, RenderGraphAccess::RenderTarget)
    }

    pub fn write_render_target_subresource(
        &mut self,
        name: &str,
        subresource: u32,
        original: Option<&str>,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.write(name, subresource, original, RenderGraphAccess::RenderTarget)
    }

    pub fn write_depth_stencil(
        &mut self,
        name: &str,
        original: Option<&str>,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.write(name, 0, original, RenderGraphAccess::DepthWrite)
    }

    /// Write a texture through an unordered access view
    pub fn write_texture(
        &mut self,
        name: &str,
        original: Option<&str>,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.write(name, 0, original, RenderGraphAccess::UnorderedAccess)
    }

    pub fn write_texture_subresource(
        &mut self,
        name: &str,
        subresource: u32,
        original: Option<&str>,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.write(name, subresource, original, RenderGraphAccess::UnorderedAccess)
    }

    /// Write a buffer through an unordered access view
    pub fn write_buffer(
        &mut self,
        name: &str,
        original: Option<&str>,
    ) -> Result<RenderGraphResourceKey, RenderGraphError> {
        self.write(name, 0, original, RenderGraphAccess::UnorderedAccess)
    }

    //
    // Reads
    //
    /// Read `name`. The name must be declared by some node of the frame (checked in `finish`).
    pub fn read(
        &mut self,
        name: &str,
        subresource: u32,
        access: RenderGraphAccess,
    ) -> Result<(), RenderGraphError> {
        let node_index = self.current_node_index(name)?;
        let name_id = self.names.intern(name);
        self.nodes[node_index].reads.push(PlannedUse {
            name: name_id,
            subresource,
            access,
        });

        Ok(())
    }

    pub fn read_texture(
        &mut self,
        name: &str,
    ) -> Result<(), RenderGraphError> {
        self.read(name, 0, RenderGraphAccess::ShaderRead)
    }

    pub fn read_texture_subresource(
        &mut self,
        name: &str,
        subresource: u32,
    ) -> Result<(), RenderGraphError> {
        self.read(name, subresource, RenderGraphAccess::ShaderRead)
    }

    /// Bind as a read-only depth target
    pub fn read_depth_stencil(
        &mut self,
        name: &str,
    ) -> Result<(), RenderGraphError> {
        self.read(name, 0, RenderGraphAccess::DepthRead)
    }

    pub fn read_buffer(
        &mut self,
        name: &str,
    ) -> Result<(), RenderGraphError> {
        self.read(name, 0, RenderGraphAccess::ShaderRead)
    }

    /// Canonicalize every declaration and merge the usage each access requires into the
    /// resource table
    #[profiling::function]
    pub fn finish(self) -> Result<RenderGraphDeclarations, RenderGraphError> {
        let ResourcePlanner {
            names,
            nodes: planned_nodes,
            resources: mut resource_infos,
            resource_indices,
            aliases,
            ..
        } = self;

        let mut nodes = Vec::with_capacity(planned_nodes.len());
        for (index, planned) in planned_nodes.into_iter().enumerate() {
            let node_name = names.display(planned.name).to_string();
            let mut canonicalize = |planned_use: &PlannedUse| -> Result<_, RenderGraphError> {
                let canonical = resolve_alias(planned_use.name, &aliases, &resource_indices)
                    .ok_or_else(|| RenderGraphError::MissingResource {
                        node: node_name.clone(),
                        resource: names.display(planned_use.name).to_string(),
                    })?;

                let info = &mut resource_infos[resource_indices[&canonical]];
                if !planned_use.access.is_valid_for(&info.desc) {
                    return Err(RenderGraphError::WrongResourceType {
                        node: node_name.clone(),
                        resource: names.display(planned_use.name).to_string(),
                        access: planned_use.access,
                    });
                }

                if planned_use.subresource >= info.desc.subresource_count() {
                    return Err(RenderGraphError::MissingResource {
                        node: node_name.clone(),
                        resource: format!(
                            "{}[{}]",
                            names.display(planned_use.name),
                            planned_use.subresource
                        ),
                    });
                }

                info.usage |= planned_use.access.required_usage();
                Ok(RenderGraphResourceUse {
                    key: RenderGraphResourceKey::new(canonical, planned_use.subresource),
                    access: planned_use.access,
                })
            };

            let mut reads: Vec<RenderGraphResourceUse> = Vec::with_capacity(planned.reads.len());
            for planned_use in &planned.reads {
                let resource_use = canonicalize(planned_use)?;
                if !reads.contains(&resource_use) {
                    reads.push(resource_use);
                }
            }

            let mut writes: Vec<RenderGraphResourceUse> = Vec::with_capacity(planned.writes.len());
            for planned_use in &planned.writes {
                let resource_use = canonicalize(planned_use)?;
                if !writes.contains(&resource_use) {
                    writes.push(resource_use);
                }
            }

            nodes.push(RenderGraphNode {
                id: RenderGraphNodeId(index),
                name: planned.name,
                queue_type: planned.queue_type,
                reads,
                writes,
                aliased_writes: planned.aliased_writes,
                relations: RelationsInGraph::default(),
            });
        }

        Ok(RenderGraphDeclarations {
            nodes,
            resources: resource_infos,
            resource_indices,
            aliases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::VelaFormat;

    fn color() -> RenderGraphTextureDesc {
        RenderGraphTextureDesc::new(VelaFormat::R8G8B8A8_UNORM)
    }

    #[test]
    fn test_alias_chain_resolves_to_original() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);

        planner.begin_node("A", VelaQueueType::Graphics).unwrap();
        let a = planner.new_render_target("PingA", color()).unwrap();
        planner.begin_node("B", VelaQueueType::Graphics).unwrap();
        planner.write_render_target("PingB", Some("PingA")).unwrap();
        planner.begin_node("C", VelaQueueType::Graphics).unwrap();
        planner.write_render_target("PingC", Some("PingB")).unwrap();

        // Multi-hop chain resolves in one call
        assert_eq!(planner.resolve("PingC"), Some(a.name));
        assert_eq!(planner.resolve("PingB"), Some(a.name));

        // Resolving the canonical name is a no-op, and so is resolving twice
        assert_eq!(planner.resolve("PingA"), Some(a.name));
        let once = planner.resolve("PingC").unwrap();
        let twice = resolve_alias(once, &planner.aliases, &planner.resource_indices);
        assert_eq!(twice, Some(once));

        let declarations = planner.finish().unwrap();
        assert_eq!(declarations.resources.len(), 1);
        assert_eq!(declarations.nodes[2].writes[0].key.name, a.name);
        assert_eq!(declarations.nodes[2].aliased_writes.len(), 1);
    }

    #[test]
    fn test_self_alias_is_rejected() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("A", VelaQueueType::Graphics).unwrap();
        planner.new_render_target("Color", color()).unwrap();

        let result = planner.write_render_target("Color", Some("Color"));
        assert!(matches!(result, Err(RenderGraphError::SelfAlias { .. })));
    }

    #[test]
    fn test_alias_of_unknown_original() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("A", VelaQueueType::Graphics).unwrap();

        let result = planner.write_render_target("Color2", Some("Color"));
        assert!(matches!(
            result,
            Err(RenderGraphError::MissingResource { .. })
        ));
    }

    #[test]
    fn test_alias_conflict() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("A", VelaQueueType::Graphics).unwrap();
        planner.new_render_target("First", color()).unwrap();
        planner.new_render_target("Second", color()).unwrap();
        planner.begin_node("B", VelaQueueType::Graphics).unwrap();
        planner.write_render_target("Alias", Some("First")).unwrap();

        // Same original again is fine
        planner.write_render_target("Alias", Some("First")).unwrap();
        let result = planner.write_render_target("Alias", Some("Second"));
        assert!(matches!(result, Err(RenderGraphError::AliasConflict { .. })));
    }

    #[test]
    fn test_read_of_undeclared_name() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("Tonemap", VelaQueueType::Graphics).unwrap();
        planner.read_texture("ColorBuffer").unwrap();

        match planner.finish() {
            Err(RenderGraphError::MissingResource { node, resource }) => {
                assert_eq!(node, "Tonemap");
                assert_eq!(resource, "ColorBuffer");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_usage_flags_merge() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("Forward", VelaQueueType::Graphics).unwrap();
        let key = planner.new_render_target("Color", color()).unwrap();
        planner.begin_node("Blur", VelaQueueType::Compute).unwrap();
        planner.read_texture("Color").unwrap();
        planner.begin_node("Overlay", VelaQueueType::Graphics).unwrap();
        planner.new_render_target("Color", color()).unwrap();

        let declarations = planner.finish().unwrap();
        assert_eq!(declarations.resources.len(), 1);
        let info = &declarations.resources[declarations.resource_indices[&key.name]];
        assert_eq!(
            info.usage,
            VelaResourceUsage::RENDER_TARGET | VelaResourceUsage::SHADER_RESOURCE
        );
    }

    #[test]
    fn test_conflicting_description() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("A", VelaQueueType::Graphics).unwrap();
        planner.new_render_target("Color", color()).unwrap();
        let result = planner.new_render_target(
            "Color",
            RenderGraphTextureDesc::new(VelaFormat::R16G16B16A16_SFLOAT),
        );
        assert!(matches!(
            result,
            Err(RenderGraphError::ConflictingDescription { .. })
        ));
    }

    #[test]
    fn test_wrong_resource_type() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        planner.begin_node("A", VelaQueueType::Compute).unwrap();
        planner
            .new_buffer("Particles", RenderGraphBufferDesc { size: 1024 })
            .unwrap();
        planner.begin_node("B", VelaQueueType::Graphics).unwrap();
        planner.write_render_target("Particles", None).unwrap();

        assert!(matches!(
            planner.finish(),
            Err(RenderGraphError::WrongResourceType { .. })
        ));
    }

    #[test]
    fn test_declarations_need_a_node() {
        let mut names = NameRegistry::new();
        let mut planner = ResourcePlanner::new(&mut names);
        assert!(matches!(
            planner.read_texture("Color"),
            Err(RenderGraphError::NoActiveNode { .. })
        ));

        planner.begin_node("A", VelaQueueType::Graphics).unwrap();
        assert!(matches!(
            planner.begin_node("A", VelaQueueType::Graphics),
            Err(RenderGraphError::DuplicateNode { .. })
        ));
    }
}

use super::{RenderGraphResourceKey, RenderGraphResourceUse};
use vela_api::VelaQueueType;
use vela_base::Name;

/// Index of a node in the order it was added to the planner
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderGraphNodeId(pub(crate) usize);

impl RenderGraphNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A write that introduced (or reused) an alias of an earlier resource
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderGraphAliasedWrite {
    pub alias: Name,
    pub original: RenderGraphResourceKey,
}

/// Why `producer` has to run before the node holding this record
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderGraphDependencyReason {
    pub producer: RenderGraphNodeId,
    pub resource: RenderGraphResourceKey,
}

/// Scheduling information computed for a node every frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationsInGraph {
    /// Longest path from a node without dependencies. Nodes in the same layer don't depend on
    /// each other.
    pub layer: u32,
    /// Position in the order nodes were added
    pub original_index: usize,
    /// Position in the dependency-first traversal
    pub ordered_index: usize,
    /// Position in the final execution order
    pub execution_index: usize,
    /// Nodes that must run before this one, sorted by id
    pub dependencies: Vec<RenderGraphNodeId>,
    pub dependency_reasons: Vec<RenderGraphDependencyReason>,
    /// Dependencies on other queues. Each needs a GPU-side fence wait.
    pub nodes_to_sync_with: Vec<RenderGraphNodeId>,
    /// Subset of `dependency_reasons` that crosses queues, kept for debug output
    pub sync_reasons: Vec<RenderGraphDependencyReason>,
    pub sync_required: bool,
    /// Fence values waited on before this node was submitted. Filled in at submission.
    pub synchronization_index_set: Vec<(VelaQueueType, u64)>,
}

/// One pass's declarations for the frame
#[derive(Clone, Debug)]
pub struct RenderGraphNode {
    pub(crate) id: RenderGraphNodeId,
    pub(crate) name: Name,
    pub(crate) queue_type: VelaQueueType,
    pub(crate) reads: Vec<RenderGraphResourceUse>,
    pub(crate) writes: Vec<RenderGraphResourceUse>,
    pub(crate) aliased_writes: Vec<RenderGraphAliasedWrite>,
    pub(crate) relations: RelationsInGraph,
}

impl RenderGraphNode {
    pub fn id(&self) -> RenderGraphNodeId {
        self.id
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn queue_type(&self) -> VelaQueueType {
        self.queue_type
    }

    pub fn reads(&self) -> &[RenderGraphResourceUse] {
        &self.reads
    }

    pub fn writes(&self) -> &[RenderGraphResourceUse] {
        &self.writes
    }

    pub fn aliased_writes(&self) -> &[RenderGraphAliasedWrite] {
        &self.aliased_writes
    }

    pub fn relations(&self) -> &RelationsInGraph {
        &self.relations
    }

    /// Reads followed by writes, in declaration order
    pub fn resource_uses(&self) -> impl Iterator<Item = &RenderGraphResourceUse> {
        self.reads.iter().chain(self.writes.iter())
    }
}

use super::RenderGraphAccess;
use vela_api::VelaError;

/// Configuration errors found while planning a frame. These indicate a mistake in how passes
/// declare their resources, so the frame that produced them must not be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderGraphError {
    /// A node read (or aliased) a name that no node declares
    MissingResource { node: String, resource: String },
    /// A write named itself as its own original
    SelfAlias { node: String, resource: String },
    /// A name was aliased to two different originals
    AliasConflict {
        resource: String,
        existing: String,
        requested: String,
    },
    /// The same name was declared twice with incompatible descriptions
    ConflictingDescription { resource: String },
    /// A texture access on a buffer or the other way around
    WrongResourceType {
        node: String,
        resource: String,
        access: RenderGraphAccess,
    },
    DuplicateNode { node: String },
    /// A declaration was made before any node was started
    NoActiveNode { resource: String },
    /// A transient resource is read but no node writes it this frame
    NoProducer { node: String, resource: String },
    /// The dependencies form a cycle. Nodes are listed in the order the cycle was walked.
    Cycle {
        nodes: Vec<String>,
        resources: Vec<String>,
    },
}

impl std::error::Error for RenderGraphError {}

impl core::fmt::Display for RenderGraphError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match self {
            RenderGraphError::MissingResource { node, resource } => write!(
                fmt,
                "Node {} references resource {} which is never declared",
                node, resource
            ),
            RenderGraphError::SelfAlias { node, resource } => write!(
                fmt,
                "Node {} writes {} as an alias of itself",
                node, resource
            ),
            RenderGraphError::AliasConflict {
                resource,
                existing,
                requested,
            } => write!(
                fmt,
                "Resource {} is already an alias of {} and can't become an alias of {}",
                resource, existing, requested
            ),
            RenderGraphError::ConflictingDescription { resource } => write!(
                fmt,
                "Resource {} was declared more than once with different descriptions",
                resource
            ),
            RenderGraphError::WrongResourceType {
                node,
                resource,
                access,
            } => write!(
                fmt,
                "Node {} can't access resource {} as {:?}",
                node, resource, access
            ),
            RenderGraphError::DuplicateNode { node } => {
                write!(fmt, "Node {} was added to the graph twice", node)
            }
            RenderGraphError::NoActiveNode { resource } => write!(
                fmt,
                "Resource {} was declared outside of a node",
                resource
            ),
            RenderGraphError::NoProducer { node, resource } => write!(
                fmt,
                "Node {} reads resource {} but no node writes it this frame",
                node, resource
            ),
            RenderGraphError::Cycle { nodes, resources } => write!(
                fmt,
                "Render graph has a cycle through nodes [{}] via resources [{}]",
                nodes.join(" -> "),
                resources.join(", ")
            ),
        }
    }
}

impl From<RenderGraphError> for VelaError {
    fn from(error: RenderGraphError) -> Self {
        VelaError::StringError(error.to_string())
    }
}

pub use vela_base as base;

pub use vela_api as api;

#[cfg(feature = "framework")]
pub use vela_framework as framework;

#[cfg(feature = "framework")]
pub use vela_framework::graph;

#[cfg(feature = "framework")]
pub use vela_framework::renderer;

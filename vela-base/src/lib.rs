//! Lowest level crate of `vela`. Index allocation, string interning and a few small utilities
//! shared by the other crates.

mod decimal;
pub use decimal::DecimalF32;

mod index_pool;
pub use index_pool::IndexPool;

mod name_registry;
pub use name_registry::Name;
pub use name_registry::NameRegistry;

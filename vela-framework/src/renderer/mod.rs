//! The frame driver: pass interface, frame pacing and the `Renderer` loop

mod config;
pub use config::RendererConfig;

mod timer;
pub use timer::FrameTimer;

mod render_pass;
pub use render_pass::*;

mod frame_sync;
pub use frame_sync::FrameSync;

#[allow(clippy::module_inception)]
mod renderer;
pub use renderer::*;

//! CPU to GPU data transfer. `UploadRingBuffer` is a CPU-visible ring shared by the frames in
//! flight, `ResourceCopyManager` turns ring allocations into copies to GPU-only buffers.

mod upload_error;
pub use upload_error::UploadError;

mod upload_ring;
pub use upload_ring::*;

mod copy_manager;
pub use copy_manager::*;

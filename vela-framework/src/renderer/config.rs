#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};
use vela_api::VelaResult;

/// Sizing of the per-frame and long-lived allocators owned by a `Renderer`
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RendererConfig {
    /// How many frames the CPU may record ahead of the GPU
    pub frames_in_flight: u32,
    /// Bytes of CPU-visible upload memory shared by all frames in flight
    pub upload_ring_size: u64,
    pub rtv_page_size: u32,
    pub dsv_page_size: u32,
    pub srv_uav_page_size: u32,
    /// Shader-visible descriptors each frame may allocate
    pub dynamic_descriptors_per_frame: u32,
    /// Transient resources unused for this many frames are destroyed
    pub resource_retention_frames: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            frames_in_flight: 2,
            upload_ring_size: 4 * 1024 * 1024,
            rtv_page_size: 64,
            dsv_page_size: 16,
            srv_uav_page_size: 256,
            dynamic_descriptors_per_frame: 1024,
            resource_retention_frames: 3,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> VelaResult<()> {
        let fields = [
            ("frames_in_flight", self.frames_in_flight as u64),
            ("upload_ring_size", self.upload_ring_size),
            ("rtv_page_size", self.rtv_page_size as u64),
            ("dsv_page_size", self.dsv_page_size as u64),
            ("srv_uav_page_size", self.srv_uav_page_size as u64),
            (
                "dynamic_descriptors_per_frame",
                self.dynamic_descriptors_per_frame as u64,
            ),
            (
                "resource_retention_frames",
                self.resource_retention_frames as u64,
            ),
        ];

        for (name, value) in fields {
            if value == 0 {
                return Err(format!("RendererConfig::{} must be non-zero", name))?;
            }
        }

        Ok(())
    }
}

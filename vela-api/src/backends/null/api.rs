use super::VelaDeviceContextNull;
use crate::VelaResult;
use std::time::Duration;

/// Options for creating the null backend
#[derive(Clone, Debug, Default)]
pub struct VelaApiDefNull {
    /// Every executed command list sleeps this long on its queue's worker thread before its
    /// commands take effect. Zero executes immediately.
    pub execution_latency: Duration,
}

pub struct VelaApiNull {
    device_context: Option<VelaDeviceContextNull>,
}

impl VelaApiNull {
    pub fn new(api_def: &VelaApiDefNull) -> VelaResult<Self> {
        log::info!(
            "Creating null device (execution latency {:?})",
            api_def.execution_latency
        );

        Ok(VelaApiNull {
            device_context: Some(VelaDeviceContextNull::new(api_def)),
        })
    }

    pub fn device_context(&self) -> &VelaDeviceContextNull {
        // Only None after destroy(), which consumes the api at the front-end level
        self.device_context.as_ref().unwrap()
    }

    pub fn destroy(&mut self) -> VelaResult<()> {
        if let Some(device_context) = self.device_context.take() {
            device_context.wait_for_idle()?;
        }

        Ok(())
    }
}

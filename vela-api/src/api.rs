use crate::null::{VelaApiDefNull, VelaApiNull};
use crate::{VelaDeviceContext, VelaResult};

/// Primary entry point to using the API. Use the `new_*` functions to initialize the desired
/// backend.
///
/// **This API object should persist for the lifetime of all objects created through it.**
///
/// Additional backends slot in as further variants. Everything above the API only ever talks to
/// these enums.
pub enum VelaApi {
    Null(VelaApiNull),
}

impl VelaApi {
    /// Initialize a headless device that executes command lists on worker threads
    pub fn new_null(api_def: &VelaApiDefNull) -> VelaResult<Self> {
        Ok(VelaApi::Null(VelaApiNull::new(api_def)?))
    }

    pub fn device_context(&self) -> VelaDeviceContext {
        match self {
            VelaApi::Null(inner) => VelaDeviceContext::Null(inner.device_context().clone()),
        }
    }

    /// Waits for all submitted work to finish and releases the device. Calling this is optional,
    /// dropping the device context has the same effect once every object created from it is
    /// gone.
    pub fn destroy(&mut self) -> VelaResult<()> {
        match self {
            VelaApi::Null(inner) => inner.destroy(),
        }
    }
}

use std::sync::Arc;

pub type VelaResult<T> = Result<T, VelaError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
#[derive(Debug, Clone)]
pub enum VelaError {
    StringError(String),
    IoError(Arc<std::io::Error>),
    /// The device was lost. Nothing created from it can be used again.
    DeviceRemoved(String),
}

impl std::error::Error for VelaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            VelaError::StringError(_) => None,
            VelaError::IoError(ref e) => Some(&**e),
            VelaError::DeviceRemoved(_) => None,
        }
    }
}

impl core::fmt::Display for VelaError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            VelaError::StringError(ref e) => e.fmt(fmt),
            VelaError::IoError(ref e) => e.fmt(fmt),
            VelaError::DeviceRemoved(ref e) => write!(fmt, "Device removed: {}", e),
        }
    }
}

impl From<&str> for VelaError {
    fn from(str: &str) -> Self {
        VelaError::StringError(str.to_string())
    }
}

impl From<String> for VelaError {
    fn from(string: String) -> Self {
        VelaError::StringError(string)
    }
}

impl From<std::io::Error> for VelaError {
    fn from(error: std::io::Error) -> Self {
        VelaError::IoError(Arc::new(error))
    }
}

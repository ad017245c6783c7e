use vela_api::VelaError;

#[derive(Debug)]
pub enum UploadError {
    /// The ring can't fit the request until more frames complete
    BufferFull { requested: u64, available: u64 },
    Other(VelaError),
}

impl UploadError {
    // Helpful for when types are not being inferred as expected
    pub fn into_vela_error(self) -> VelaError {
        self.into()
    }
}

impl std::error::Error for UploadError {}

impl core::fmt::Display for UploadError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            UploadError::BufferFull {
                requested,
                available,
            } => write!(
                fmt,
                "Upload buffer full: {} bytes requested, {} available",
                requested, available
            ),
            UploadError::Other(ref e) => e.fmt(fmt),
        }
    }
}

impl From<VelaError> for UploadError {
    fn from(error: VelaError) -> Self {
        UploadError::Other(error)
    }
}

impl From<UploadError> for VelaError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::BufferFull {
                requested,
                available,
            } => VelaError::StringError(format!(
                "Upload buffer full: {} bytes requested, {} available",
                requested, available
            )),
            UploadError::Other(e) => e,
        }
    }
}

impl From<&str> for UploadError {
    fn from(str: &str) -> Self {
        VelaError::StringError(str.to_string()).into()
    }
}

impl From<String> for UploadError {
    fn from(string: String) -> Self {
        VelaError::StringError(string).into()
    }
}

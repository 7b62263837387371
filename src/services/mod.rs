pub mod devices;
pub mod network;

pub use devices::DeviceService;
pub use network::NetworkService;

/// Typed error for caller-contract violations (missing required fields).
/// Surfaced to the caller as-is and never retried.
#[derive(Debug)]
pub struct InvalidInputError {
    pub message: String,
}

impl InvalidInputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for InvalidInputError {}

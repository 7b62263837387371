mod devices;
mod interfaces;

pub use devices::*;
pub use interfaces::*;

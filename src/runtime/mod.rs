mod config;
mod error;
mod logging;

pub use config::*;
pub use error::MpraError;
pub use logging::*;

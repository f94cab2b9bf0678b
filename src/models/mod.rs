pub mod config;
pub mod provider;
pub mod session;

pub use config::*;
pub use provider::*;
pub use session::*;

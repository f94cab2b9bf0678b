pub mod checkpoint;
pub mod config;
pub mod fakes;
pub mod generator;
pub mod parser;
pub mod prompts;
pub mod runner;
pub mod sandbox;

pub use checkpoint::*;
pub use config::*;
pub use fakes::*;
pub use generator::*;
pub use parser::*;
pub use prompts::*;
pub use runner::*;
pub use sandbox::*;

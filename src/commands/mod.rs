pub mod init;
pub mod run;

pub use init::*;
pub use run::*;

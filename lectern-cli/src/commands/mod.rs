//! CLI command implementations.

pub mod clean;
pub mod compile;
pub mod init;

pub use clean::clean_cache;
pub use compile::{compile_site, CompileOptions};
pub use init::init_project;

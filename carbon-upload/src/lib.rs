pub mod cli;
pub mod client;
pub mod load_config;
pub mod local_file;

pub use cli::{run, Cli, Commands};

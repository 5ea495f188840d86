//! Engine module: CLI, hashing, progress and path helpers

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::handle_run;
pub use hashing::{hash_bytes, hash_file};
pub use tools::{
    check_root_dir, digest_hex, format_usage, glob_match, is_os_hidden_file, path_relative_to,
    should_include_in_walk,
};

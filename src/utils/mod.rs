pub mod config;
pub mod fd_limit;
pub mod logger;
pub(crate) mod treesum_toml;

pub use config::*;
pub use fd_limit::{FDS_PER_SLOT, cap_open_files, max_open_fds, max_slots_by_fd_limit};
pub use logger::setup_logging;

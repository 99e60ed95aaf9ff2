//! CLI command handlers.

mod batch;
mod config;

pub use batch::{run_batch_file, BatchArgs};
pub use config::run_show_config;

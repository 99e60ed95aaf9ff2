pub mod config;
pub mod logging;

pub mod batch;
pub mod settle;
pub mod store;

mod config;
mod plan;

pub mod providers;
pub use config::*;
pub use plan::*;
pub use providers::*;

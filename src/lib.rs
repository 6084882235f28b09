pub mod agent;
pub mod assistant;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod operation;
pub mod sink;
pub mod slot;

pub use assistant::Assistant;
pub use error::{AssistError, Result};

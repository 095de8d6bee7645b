pub mod cli;
pub mod commands;
pub mod context;
pub mod flows;
pub mod output;
pub mod session;

pub use facegate_core::errors;

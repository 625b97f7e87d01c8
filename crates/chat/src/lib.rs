pub mod cli;
pub mod runtime;

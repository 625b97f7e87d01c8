//! Shared types for the toolchat workspace: conversation messages, tool
//! calls, configuration, and the common error type.

pub mod config;
pub mod error;
pub mod tool;
pub mod trace;

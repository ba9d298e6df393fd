//! Operator front end for DEST rule configuration.
//!
//! ```text
//!   argv / shell line ──► dispatch ──► commands::* ──┬── batch flags ──┐
//!                                                    └── prompts ──────┴──► RuleDraft
//!                                                                               │
//!                                                                               ▼
//!                                                                           dest-core
//! ```
//!
//! The library holds everything but process setup so that whole command
//! lines can be driven from tests with scripted input.

pub mod batch;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod interactive;
pub mod prompt;

pub use config::DestConfig;
pub use dispatch::{dispatch, CommandError, Session};
pub use prompt::{Console, PromptError};

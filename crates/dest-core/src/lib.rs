//! DEST: Drive Error Simulation Tool, rule configuration core.
//!
//! Operators describe *error rules*: which drive, which LBA window, which
//! SCSI operations, what error to return and how often.  This crate owns the
//! rule schema and everything that must agree on it:
//!
//! ```text
//!                     ┌──────────────┐
//!                     │ Lookup tables│  opcodes, sense errors,
//!                     └──────┬───────┘  port errors, scenarios
//!                            │
//!   batch flags ──┐          ▼
//!   prompts ──────┼──► RuleDraft ──► RuleValidator ──► ErrorRule
//!   XML loader ───┘                    │                  │
//!                                      │ layout           │ add/next/remove
//!                                      ▼                  ▼
//!                               ┌────────────┐   ┌──────────────────┐
//!                               │  Topology  │   │ InjectionService │
//!                               └────────────┘   └──────────────────┘
//! ```
//!
//! The injection engine and drive discovery are external collaborators,
//! reached only through the [`service::Topology`] and
//! [`service::InjectionService`] traits.  [`sim`] provides in-memory
//! implementations of both.

pub mod lookup;
pub mod number;
pub mod persist;
pub mod rule;
pub mod scenario;
pub mod service;
pub mod sim;
pub mod validate;

//! # Platform Abstraction Layer
//!
//! Provides the OS boundary for the scheduler: saved execution contexts
//! and context transfer (`context`), and the two interrupt sources with
//! their handlers (`unix`). Currently implements the glibc/Linux port;
//! another port would add sibling modules with the same surface.

pub mod context;
pub mod unix;

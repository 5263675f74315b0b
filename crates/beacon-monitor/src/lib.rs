//! beacon-monitor: Exercise the loading manager from the command line.
//!
//! Runs simulated concurrent workloads or real GraphQL queries through a
//! `LoadingManager` and reports every transition it delivers.

pub mod error;
pub mod settle;
pub mod simulate;

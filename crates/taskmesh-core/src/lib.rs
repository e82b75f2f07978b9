//! # taskmesh-core
//!
//! Core types and utilities for studying task redistribution on faulted
//! multi-agent mesh networks: a weighted undirected graph of agents with
//! finite capacities, partitioned into groups, where a fraction of agents
//! fails and their tasks must move to survivors.
//!
//! This crate provides the building blocks every migration strategy runs
//! on:
//!
//! - **Data model**: [`Task`], [`Agent`], [`Group`], [`MigrationRecord`]
//!   and the id newtypes tying them together without reference cycles.
//! - **Loaders**: the three line-oriented input formats via the
//!   [`loader`] module.
//! - **World**: [`World`] construction, initial task matching and
//!   deterministic fault injection.
//! - **Graph**: the weighted [`Graph`], the memoizing
//!   [`DistanceOracle`], and weighted betweenness centrality.
//! - **Survivability**: the clamped `IS` / `GS` curves and the
//!   contextual-load scalar in [`survival`].
//! - **Evaluation**: execution cost, migration cost, survival rate and
//!   the composite target via [`eval`].
//!
//! ## Example
//!
//! ```rust
//! use taskmesh_core::prelude::*;
//!
//! let agents = vec![
//!     Agent::new(AgentId::new(0), 10.0, GroupId::new(0)),
//!     Agent::new(AgentId::new(1), 10.0, GroupId::new(0)),
//! ];
//! let tasks = vec![Task::new(TaskId::new(0), 5.0, ARRIVE_AT_START)];
//!
//! let mut world = World::from_inputs(tasks, agents).unwrap();
//! world.initialize(&WorldConfig::default());
//! assert_eq!(world.placed_task_count(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod eval;
pub mod graph;
pub mod loader;
pub mod survival;
pub mod types;
pub mod world;

// Re-export commonly used types at the crate root
pub use error::{CoreError, CoreResult};
pub use eval::{evaluate, Evaluation, InputStats, RunResult, TargetWeights};
pub use graph::{DistanceOracle, Graph};
pub use types::{
    Agent, AgentId, Group, GroupId, MigrationRecord, Task, TaskId, ARRIVE_AT_START,
};
pub use world::{World, WorldConfig, DEFAULT_FAULT_RATIO, INTERACTION_LEVELS};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// ```rust
/// use taskmesh_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::eval::{evaluate, Evaluation, InputStats, RunResult, TargetWeights};
    pub use crate::graph::{DistanceOracle, Graph};
    pub use crate::types::{
        Agent, AgentId, Group, GroupId, MigrationRecord, Task, TaskId, ARRIVE_AT_START,
    };
    pub use crate::world::{World, WorldConfig};
}

//! Core data types of the taskmesh world.
//!
//! The entities here form the in-memory world state every migration
//! strategy operates on: [`Task`], [`Agent`], [`Group`] and
//! [`MigrationRecord`]. Agents and groups reference each other by id only;
//! the [`crate::world::World`] keeps the two lookup maps, so no reference
//! cycles ever exist.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Arrival time marking a task as present at t = 0.
pub const ARRIVE_AT_START: i64 = -1;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a task, taken verbatim from the task input file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TaskId(u32);

impl TaskId {
    /// Creates a task id from its raw value.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an agent (a vertex of the mesh).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates an agent id from its raw value.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a group (a partition block of agents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct GroupId(u32);

impl GroupId {
    /// Creates a group id from its raw value.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Task
// =============================================================================

/// A unit of work with a fixed size. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// Execution size (non-negative)
    pub size: f64,
    /// Arrival time; [`ARRIVE_AT_START`] means present at t = 0
    pub arrive_time: i64,
}

impl Task {
    /// Creates a new task.
    #[must_use]
    pub fn new(id: TaskId, size: f64, arrive_time: i64) -> Self {
        Self {
            id,
            size,
            arrive_time,
        }
    }

    /// Returns `true` if the task is present in the initial placement.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.arrive_time == ARRIVE_AT_START
    }
}

// =============================================================================
// Agent
// =============================================================================

/// A node of the mesh with a capacity and a mutable task list.
///
/// `load` always equals the sum of `tasks` sizes; use [`Agent::push_task`]
/// and [`Agent::remove_task`] to keep that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier
    pub id: AgentId,
    /// Execution capacity (positive)
    pub capacity: f64,
    /// Current execution load (sum of task sizes)
    pub load: f64,
    /// Tasks currently placed on this agent, in placement order
    pub tasks: Vec<Task>,
    /// Group this agent belongs to
    pub group_id: GroupId,
    /// Functional fault indicator; a faulted agent is only ever a
    /// migration source, never a destination
    pub fault_functional: bool,
    /// Overload-fault probability in [0, 1]
    pub fault_overload: f64,
}

impl Agent {
    /// Creates a healthy, unloaded agent.
    #[must_use]
    pub fn new(id: AgentId, capacity: f64, group_id: GroupId) -> Self {
        Self {
            id,
            capacity,
            load: 0.0,
            tasks: Vec::new(),
            group_id,
            fault_functional: false,
            fault_overload: 0.0,
        }
    }

    /// Current load-to-capacity ratio.
    #[must_use]
    pub fn load_ratio(&self) -> f64 {
        self.load / self.capacity
    }

    /// Remaining headroom before the agent overloads.
    #[must_use]
    pub fn headroom(&self) -> f64 {
        self.capacity - self.load
    }

    /// Places a task on this agent, updating the load.
    pub fn push_task(&mut self, task: Task) {
        self.load += task.size;
        self.tasks.push(task);
    }

    /// Removes the task at `index`, updating the load.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_task(&mut self, index: usize) -> Task {
        let task = self.tasks.remove(index);
        self.load -= task.size;
        task
    }

    /// Index of the largest task, ties resolved to the earliest placed.
    #[must_use]
    pub fn largest_task_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, task) in self.tasks.iter().enumerate() {
            match best {
                Some(b) if self.tasks[b].size >= task.size => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

// =============================================================================
// Group
// =============================================================================

/// A partition block of agents sharing a leader and an interaction level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Unique group identifier
    pub id: GroupId,
    /// Member agent ids
    pub members: BTreeSet<AgentId>,
    /// Elected leader, if any
    pub leader: Option<AgentId>,
    /// Backup leaders in descending centrality order (at most two)
    pub backup_leaders: Vec<AgentId>,
    /// Sum of member loads
    pub load: f64,
    /// Sum of member capacities (faulted members subtracted at injection)
    pub capacity: f64,
    /// Cross-group interaction level, drawn from {0.1, 0.2}
    pub interaction_level: f64,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
            leader: None,
            backup_leaders: Vec::new(),
            load: 0.0,
            capacity: 0.0,
            interaction_level: 0.0,
        }
    }

    /// Number of member agents.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

// =============================================================================
// MigrationRecord
// =============================================================================

/// One migrated task: where it came from and where it went.
///
/// Records are appended in execution order; that order is part of the
/// observable output of a strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Source agent
    pub from: AgentId,
    /// Destination agent
    pub to: AgentId,
}

impl MigrationRecord {
    /// Creates a migration record.
    #[must_use]
    pub fn new(from: AgentId, to: AgentId) -> Self {
        Self { from, to }
    }
}

impl std::fmt::Display for MigrationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

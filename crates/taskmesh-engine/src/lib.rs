//! # taskmesh-engine
//!
//! The four migration strategies compared by taskmesh, behind one seam:
//!
//! - **HGTM**: hierarchical group task migration (leader election,
//!   potential fields, bag formation, grouped migration).
//! - **MPFTM**: potential-field task migration, also HGTM's
//!   preparatory shedding pass.
//! - **GBMA**: greedy shortest-path migration.
//! - **MMLMA**: greedy max-remaining-capacity migration.
//!
//! Every strategy receives a freshly initialized [`World`] and a
//! [`DistanceOracle`] over the immutable run graph, mutates agent task
//! lists, and returns the ordered list of [`MigrationRecord`]s.
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskmesh_core::prelude::*;
//! use taskmesh_engine::{Algorithm, EngineResult, StrategyParams};
//!
//! # fn demo(mut world: World, oracle: DistanceOracle) -> EngineResult<()> {
//! let strategy = Algorithm::Hgtm.strategy(StrategyParams::default());
//! let records = strategy.run(&mut world, &oracle)?;
//! println!("{} migrations", records.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::str::FromStr;

use thiserror::Error;

use taskmesh_core::{CoreError, DistanceOracle, MigrationRecord, TargetWeights, World};

pub mod greedy;
pub mod hgtm;
pub mod leaders;
pub mod mpftm;
pub mod potential;

pub use greedy::{Gbma, Mmlma};
pub use hgtm::Hgtm;
pub use mpftm::Mpftm;

/// A specialized `Result` type for strategy runs.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by migration strategies.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// A core-layer failure (unknown id, invalid transfer)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The algorithm name could not be parsed
    #[error("unknown algorithm '{0}' (expected hgtm, mpftm, gbma or mmlma)")]
    UnknownAlgorithm(String),
}

/// Tunable weights shared by the strategies.
#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    /// The `a` / `b` weights of the composite target; `a` also scales the
    /// congestion terms and `b` the survivability terms of the potential
    /// fields
    pub target: TargetWeights,
    /// Balance between field value and travel distance in MPFTM's
    /// destination choice (`alpha`)
    pub distance_weight: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            target: TargetWeights::default(),
            distance_weight: 0.1,
        }
    }
}

/// Common seam of the four migration strategies.
pub trait MigrationStrategy: Send + Sync {
    /// Short lowercase strategy name, used in reports and the CLI.
    fn name(&self) -> &'static str;

    /// Runs the strategy on an initialized world, returning migration
    /// records in execution order.
    ///
    /// # Errors
    ///
    /// Fails only on internal inconsistencies (unknown ids); a world
    /// produced by `World::initialize` never triggers them.
    fn run(&self, world: &mut World, oracle: &DistanceOracle)
        -> EngineResult<Vec<MigrationRecord>>;
}

/// The four comparable algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Hierarchical group task migration
    Hgtm,
    /// Potential-field task migration
    Mpftm,
    /// Greedy shortest-path migration
    Gbma,
    /// Greedy max-remaining-capacity migration
    Mmlma,
}

impl Algorithm {
    /// All algorithms in their canonical comparison order.
    #[must_use]
    pub fn all() -> [Self; 4] {
        [Self::Hgtm, Self::Mpftm, Self::Gbma, Self::Mmlma]
    }

    /// The strategy's lowercase name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hgtm => "hgtm",
            Self::Mpftm => "mpftm",
            Self::Gbma => "gbma",
            Self::Mmlma => "mmlma",
        }
    }

    /// Instantiates the strategy with the given parameters.
    #[must_use]
    pub fn strategy(&self, params: StrategyParams) -> Box<dyn MigrationStrategy> {
        match self {
            Self::Hgtm => Box::new(Hgtm::new(params)),
            Self::Mpftm => Box::new(Mpftm::new(params)),
            Self::Gbma => Box::new(Gbma::new()),
            Self::Mmlma => Box::new(Mmlma::new()),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hgtm" => Ok(Self::Hgtm),
            "mpftm" => Ok(Self::Mpftm),
            "gbma" => Ok(Self::Gbma),
            "mmlma" => Ok(Self::Mmlma),
            other => Err(EngineError::UnknownAlgorithm(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_round_trip() {
        for algorithm in Algorithm::all() {
            let parsed: Algorithm = algorithm.name().parse().expect("parse");
            assert_eq!(parsed, algorithm);
        }
        assert_eq!("HGTM".parse::<Algorithm>().expect("case"), Algorithm::Hgtm);
        assert!("dijkstra".parse::<Algorithm>().is_err());
    }
}

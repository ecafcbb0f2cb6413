//! Engine error type.

use galactic_types::{CivilizationId, PlayerId, RegionId};

use crate::clock::ClockError;
use crate::config::ConfigError;
use crate::persist::PersistError;

/// Errors returned by [`ScalableSimulationEngine`] operations.
///
/// [`ScalableSimulationEngine`]: crate::engine::ScalableSimulationEngine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration was rejected.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// State could not be persisted.
    #[error("persistence error: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: PersistError,
    },

    /// `initialize` was called more than once.
    #[error("engine is already initialized")]
    AlreadyInitialized,

    /// An operation needs `initialize` first.
    #[error("engine is not initialized")]
    NotInitialized,

    /// A player registration was malformed.
    #[error("invalid player: {reason}")]
    InvalidPlayer {
        /// What is wrong with the request.
        reason: String,
    },

    /// A player with this id already exists.
    #[error("player {player_id} already exists")]
    DuplicatePlayer {
        /// The conflicting id.
        player_id: PlayerId,
    },

    /// A civilization with this id already exists.
    #[error("civilization {civilization_id} already exists")]
    DuplicateCivilization {
        /// The conflicting id.
        civilization_id: CivilizationId,
    },

    /// The named region does not exist.
    #[error("unknown region: {region_id}")]
    UnknownRegion {
        /// The missing region.
        region_id: RegionId,
    },

    /// No more players can be admitted.
    #[error("player capacity reached ({limit} players)")]
    CapacityReached {
        /// The limit that was hit.
        limit: usize,
    },

    /// A batch task panicked or was cancelled.
    #[error("batch task failed: {message}")]
    TaskFailed {
        /// Rendered join error.
        message: String,
    },
}

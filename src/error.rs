use thiserror::Error;

use crate::model::ValidationError;
use crate::types::OperationType;

/// Errors raised by the yard model, the allocation engine and the planning session.
///
/// A container that cannot be placed is not an error; it is reported in
/// `PlanningResult::unplaced`.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("unknown zone '{0}' in zone configuration")]
    UnknownZone(String),

    #[error("invalid yard layout: {0}")]
    InvalidLayout(String),

    #[error("invalid allocation configuration: {0}")]
    InvalidConfiguration(String),

    #[error("proposal count must be between 1 and {max}, got {requested}")]
    InvalidProposalCount { requested: usize, max: usize },

    #[error("cannot determine operation type: {0}")]
    UnknownOperation(String),

    #[error("{0} containers were already planned in this session; reset it first")]
    AlreadyPlanned(OperationType),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, PlanningError>;

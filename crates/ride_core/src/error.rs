//! Typed failures returned by every core operation.

use std::fmt;

use thiserror::Error;

use crate::model::{RideId, RideStatus, Role, UserId};

/// The record a [`RideError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    User(UserId),
    Ride(RideId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::User(id) => write!(f, "user {id}"),
            EntityRef::Ride(id) => write!(f, "ride {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RideError {
    #[error("{0} not found")]
    NotFound(EntityRef),

    #[error("user {user} must have the {required} role")]
    InvalidRole { user: UserId, required: Role },

    #[error("ride {ride} cannot move from {from} to {to}")]
    InvalidTransition {
        ride: RideId,
        from: RideStatus,
        to: RideStatus,
    },

    /// Lost a compare-and-update race: the ride left `expected` before the write.
    #[error("ride {ride} is {actual}, expected {expected}")]
    Conflict {
        ride: RideId,
        expected: RideStatus,
        actual: RideStatus,
    },

    #[error("user {user} is not a party to ride {ride}")]
    Unauthorized { ride: RideId, user: UserId },

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("no driver available for ride {ride}")]
    NoMatch { ride: RideId },

    #[error("ride {ride} is {status}, operation not allowed")]
    InvalidState { ride: RideId, status: RideStatus },

    #[error("driver {driver} is not available for assignment")]
    DriverUnavailable { driver: UserId },

    #[error("rider {rider} has no pending ride requests")]
    NoPendingRequest { rider: UserId },

    #[error("ride {ride} would violate an invariant: {detail}")]
    InvariantViolation { ride: RideId, detail: &'static str },
}

impl RideError {
    /// Status code an HTTP layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            RideError::NotFound(_) | RideError::NoMatch { .. } => 404,
            RideError::InvalidRole { .. }
            | RideError::InvalidTransition { .. }
            | RideError::Conflict { .. }
            | RideError::InvalidLocation(_)
            | RideError::DriverUnavailable { .. }
            | RideError::NoPendingRequest { .. } => 400,
            RideError::Unauthorized { .. } | RideError::InvalidState { .. } => 403,
            RideError::InvariantViolation { .. } => 500,
        }
    }

    /// Conflict and NoMatch are cheap for a caller to retry; nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RideError::Conflict { .. } | RideError::NoMatch { .. })
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RideError;
use crate::spatial::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(pub u64);

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Rider,
    Driver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Rider => f.write_str("Rider"),
            Role::Driver => f.write_str("Driver"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ride status `{0}`")]
pub struct ParseStatusError(pub String);

impl RideStatus {
    pub const ALL: [RideStatus; 5] = [
        RideStatus::Requested,
        RideStatus::Accepted,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    /// Legal next states. Completed and Cancelled are terminal, no state loops to itself.
    pub fn successors(self) -> &'static [RideStatus] {
        match self {
            RideStatus::Requested => &[RideStatus::Accepted, RideStatus::Cancelled],
            RideStatus::Accepted => &[RideStatus::InProgress, RideStatus::Cancelled],
            RideStatus::InProgress => &[RideStatus::Completed, RideStatus::Cancelled],
            RideStatus::Completed | RideStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: RideStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Statuses in which a ride must carry a driver.
    pub fn has_driver(self) -> bool {
        matches!(
            self,
            RideStatus::Accepted | RideStatus::InProgress | RideStatus::Completed
        )
    }

    /// Statuses that keep the assigned driver out of the availability pool.
    pub fn holds_driver(self) -> bool {
        matches!(self, RideStatus::Accepted | RideStatus::InProgress)
    }

    pub fn as_code(self) -> &'static str {
        match self {
            RideStatus::Requested => "REQUESTED",
            RideStatus::Accepted => "ACCEPTED",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for RideStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RideStatus::ALL
            .into_iter()
            .find(|status| status.as_code() == s.trim())
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// One transportation request, tracked from request to completion or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    #[serde(rename = "rider")]
    pub rider_id: UserId,
    #[serde(rename = "driver")]
    pub driver_id: Option<UserId>,
    #[serde(rename = "pickup_location")]
    pub pickup: String,
    #[serde(rename = "dropoff_location")]
    pub dropoff: String,
    pub status: RideStatus,
    /// Last reported position of the vehicle or rider, serialized as a GeoJSON point.
    pub current_location: Option<GeoPoint>,
    /// City resolved from `current_location`; filled in asynchronously and may lag.
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(
        id: RideId,
        rider_id: UserId,
        pickup: impl Into<String>,
        dropoff: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            rider_id,
            driver_id: None,
            pickup: pickup.into(),
            dropoff: dropoff.into(),
            status: RideStatus::Requested,
            current_location: None,
            city: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rider or assigned driver.
    pub fn is_party(&self, user: UserId) -> bool {
        self.rider_id == user || self.driver_id == Some(user)
    }

    pub fn check_invariants(&self) -> Result<(), RideError> {
        if self.driver_id == Some(self.rider_id) {
            return Err(RideError::InvariantViolation {
                ride: self.id,
                detail: "rider and driver must differ",
            });
        }
        if self.driver_id.is_some() != self.status.has_driver() {
            return Err(RideError::InvariantViolation {
                ride: self.id,
                detail: "driver must be set exactly while accepted, in progress or completed",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_graph_has_no_skips_or_loops() {
        use RideStatus::*;
        assert!(Requested.can_transition_to(Accepted));
        assert!(Requested.can_transition_to(Cancelled));
        assert!(!Requested.can_transition_to(InProgress));
        assert!(!Requested.can_transition_to(Completed));
        assert!(Accepted.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Accepted));
        for status in RideStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} loops");
        }
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn status_codes_round_trip_through_from_str() {
        for status in RideStatus::ALL {
            assert_eq!(status.as_code().parse::<RideStatus>(), Ok(status));
        }
        assert_eq!(
            "DRIVING".parse::<RideStatus>(),
            Err(ParseStatusError("DRIVING".to_string()))
        );
    }

    #[test]
    fn status_serializes_as_wire_code() {
        let json = serde_json::to_string(&RideStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn invariants_reject_self_assignment_and_dangling_driver() {
        let mut ride = Ride::new(RideId(1), UserId(1), "A", "B", Utc::now());
        assert!(ride.check_invariants().is_ok());

        ride.driver_id = Some(UserId(2));
        assert!(ride.check_invariants().is_err(), "driver on a requested ride");

        ride.status = RideStatus::Accepted;
        assert!(ride.check_invariants().is_ok());

        ride.driver_id = Some(UserId(1));
        assert!(ride.check_invariants().is_err(), "rider as driver");
    }

    #[test]
    fn party_is_rider_or_driver() {
        let mut ride = Ride::new(RideId(1), UserId(1), "A", "B", Utc::now());
        ride.driver_id = Some(UserId(2));
        assert!(ride.is_party(UserId(1)));
        assert!(ride.is_party(UserId(2)));
        assert!(!ride.is_party(UserId(3)));
    }
}

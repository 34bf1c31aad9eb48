//! Terminal agent outcomes and aggregate metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FixtureKind, Need, PedestrianId, VehicleId};

/// How a vehicle's visit ended.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VehicleOutcome {
    /// Parked and paid an acceptable rate.
    Parked,
    /// Parked but resented the rate.
    ParkedWithPenalty {
        /// Rating points deducted for the rate.
        penalty: f32,
    },
    /// Wanted to park but never did.
    FailedToPark,
}

/// Walk summary of a pedestrian's round trip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedestrianOutcome {
    /// Cells entered during the trip, detours included.
    pub walked_cells: u32,
    /// Entered cells that were sidewalk-like.
    pub sidewalk_cells: u32,
    /// Needs satisfied at a fixture.
    pub fulfilled_needs: Vec<Need>,
    /// Needs that could not be satisfied.
    pub unfulfilled_needs: Vec<Need>,
}

impl PedestrianOutcome {
    /// Share of walked cells that were sidewalk-like; a trip without steps counts as fully paved.
    #[must_use]
    pub fn sidewalk_fraction(&self) -> f32 {
        if self.walked_cells == 0 {
            return 1.0;
        }
        self.sidewalk_cells as f32 / self.walked_cells as f32
    }
}

/// Terminal outcome reported for rating aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AgentOutcome {
    /// Vehicle outcome.
    Vehicle {
        /// Vehicle that finished.
        vehicle: VehicleId,
        /// How its visit ended.
        outcome: VehicleOutcome,
    },
    /// Pedestrian outcome.
    Pedestrian {
        /// Pedestrian that finished.
        pedestrian: PedestrianId,
        /// Summary of its trip.
        outcome: PedestrianOutcome,
    },
}

/// Snapshot consumed by win/lose evaluation and persistence collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Money earned or lost since the start, in cents.
    pub profit: i64,
    /// Current balance, in cents.
    pub money: i64,
    /// Rating of the previous day, if any day has been rated.
    pub rating: Option<f32>,
    /// Number of parking spots (metered or not).
    pub parking_spots: u32,
    /// Number of placed fixtures per kind.
    pub fixture_counts: BTreeMap<FixtureKind, u32>,
}

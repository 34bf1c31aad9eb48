#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic rating system that reduces a day's agent outcomes to a single score.

use parkade_core::{AgentOutcome, Command, Event, VehicleOutcome};
use tracing::{debug, info};

/// Highest rating a day or an agent can receive.
pub const MAX_RATING: f32 = 100.0;

/// Points deducted from a pedestrian's score for every need left unfulfilled.
pub const UNFULFILLED_NEED_PENALTY: f32 = 20.0;

/// Converts a terminal agent outcome into a score in `[0, 100]`.
pub trait Scoring {
    /// Scores a single outcome.
    fn score(&self, outcome: &AgentOutcome) -> f32;
}

/// Default scoring table.
///
/// Parked vehicles score 100, penalised parkers lose their penalty, failed
/// parkers score 0. Pedestrians score their sidewalk share of 100 minus
/// [`UNFULFILLED_NEED_PENALTY`] per unfulfilled need.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardScoring;

impl Scoring for StandardScoring {
    fn score(&self, outcome: &AgentOutcome) -> f32 {
        let raw = match outcome {
            AgentOutcome::Vehicle { outcome, .. } => match outcome {
                VehicleOutcome::Parked => MAX_RATING,
                VehicleOutcome::ParkedWithPenalty { penalty } => MAX_RATING - penalty,
                VehicleOutcome::FailedToPark => 0.0,
            },
            AgentOutcome::Pedestrian { outcome, .. } => {
                let unfulfilled = outcome.unfulfilled_needs.len() as f32;
                MAX_RATING * outcome.sidewalk_fraction() - UNFULFILLED_NEED_PENALTY * unfulfilled
            }
        };
        clamp_rating(raw)
    }
}

/// Pure system that collects scores during a day and emits the daily rating.
#[derive(Debug)]
pub struct Rating<S = StandardScoring> {
    scoring: S,
    scores: Vec<f32>,
    last_finalized_day: Option<u32>,
    previous_day_rating: Option<f32>,
    aggregations: u32,
}

impl Rating {
    /// Creates a rating system using [`StandardScoring`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_scoring(StandardScoring)
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scoring> Rating<S> {
    /// Creates a rating system using a custom scoring table.
    #[must_use]
    pub fn with_scoring(scoring: S) -> Self {
        Self {
            scoring,
            scores: Vec::new(),
            last_finalized_day: None,
            previous_day_rating: None,
            aggregations: 0,
        }
    }

    /// Consumes world events and emits a rating command for each newly finished day.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::OutcomeReported { outcome } => {
                    let score = self.scoring.score(outcome);
                    debug!(score, "outcome scored");
                    self.scores.push(score);
                }
                Event::DayFinalized { day } => self.finalize(*day, out),
                _ => {}
            }
        }
    }

    /// Rating computed for the most recently finalized day.
    #[must_use]
    pub fn previous_day_rating(&self) -> Option<f32> {
        self.previous_day_rating
    }

    /// Number of scores collected since the last finalized day.
    #[must_use]
    pub fn pending_scores(&self) -> usize {
        self.scores.len()
    }

    /// Number of days reduced so far.
    #[must_use]
    pub fn aggregations(&self) -> u32 {
        self.aggregations
    }

    fn finalize(&mut self, day: u32, out: &mut Vec<Command>) {
        if self.last_finalized_day.is_some_and(|last| day <= last) {
            debug!(day, "day already finalized");
            return;
        }

        let rating = mean_rating(&self.scores);
        info!(day, ?rating, scores = self.scores.len(), "day rated");
        self.scores.clear();
        self.last_finalized_day = Some(day);
        self.previous_day_rating = rating;
        self.aggregations = self.aggregations.saturating_add(1);
        out.push(Command::RecordDailyRating { day, rating });
    }
}

/// Arithmetic mean of the scores clamped to `[0, 100]`; `None` for an empty day.
#[must_use]
pub fn mean_rating(scores: &[f32]) -> Option<f32> {
    if scores.is_empty() {
        return None;
    }
    let total: f64 = scores.iter().map(|score| f64::from(*score)).sum();
    Some(clamp_rating((total / scores.len() as f64) as f32))
}

fn clamp_rating(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_RATING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkade_core::{Need, PedestrianId, PedestrianOutcome, VehicleId};

    fn vehicle(outcome: VehicleOutcome) -> AgentOutcome {
        AgentOutcome::Vehicle {
            vehicle: VehicleId::new(0),
            outcome,
        }
    }

    #[test]
    fn standard_scoring_table() {
        let scoring = StandardScoring;
        assert_eq!(scoring.score(&vehicle(VehicleOutcome::Parked)), 100.0);
        assert_eq!(
            scoring.score(&vehicle(VehicleOutcome::ParkedWithPenalty { penalty: 40.0 })),
            60.0
        );
        assert_eq!(
            scoring.score(&vehicle(VehicleOutcome::ParkedWithPenalty { penalty: 250.0 })),
            0.0
        );
        assert_eq!(scoring.score(&vehicle(VehicleOutcome::FailedToPark)), 0.0);
    }

    #[test]
    fn pedestrians_score_sidewalk_share_minus_unfulfilled_needs() {
        let outcome = AgentOutcome::Pedestrian {
            pedestrian: PedestrianId::new(1),
            outcome: PedestrianOutcome {
                walked_cells: 10,
                sidewalk_cells: 8,
                fulfilled_needs: vec![Need::Trash],
                unfulfilled_needs: vec![Need::Toilet],
            },
        };
        assert!((StandardScoring.score(&outcome) - 60.0).abs() < 1e-4);
    }

    #[test]
    fn mean_of_empty_day_is_absent() {
        assert_eq!(mean_rating(&[]), None);
        assert_eq!(mean_rating(&[100.0, 50.0, 0.0]), Some(50.0));
    }
}

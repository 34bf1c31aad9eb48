//! Scenario configuration supplied by the challenge collaborator.
//!
//! Every field is optional when deserialised; missing values fall back to the
//! defaults documented on each type.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Need, SpotKind};

/// Complete scenario description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Grid dimensions.
    pub grid: GridConfig,
    /// Money available when the scenario starts, in cents. Defaults to 50 000.
    pub starting_budget: u64,
    /// Clock ratio and start time.
    pub clock: ClockConfig,
    /// Seed shared by every random draw. Defaults to zero.
    pub rng_seed: u64,
    /// Vehicle spawn cadence.
    pub spawning: SpawnSchedule,
    /// Vehicle behaviour.
    pub vehicles: VehicleConfig,
    /// Pedestrian behaviour.
    pub pedestrians: PedestrianConfig,
    /// Display strings surfaced to the presentation layer.
    pub messages: Messages,
}

impl ScenarioConfig {
    /// Default starting budget, in cents.
    pub const DEFAULT_BUDGET: u64 = 50_000;

    /// Scenario with default values and the provided grid size.
    #[must_use]
    pub fn with_grid(width: u32, height: u32) -> Self {
        Self {
            grid: GridConfig { width, height },
            ..Self::default()
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            starting_budget: Self::DEFAULT_BUDGET,
            clock: ClockConfig::default(),
            rng_seed: 0,
            spawning: SpawnSchedule::default(),
            vehicles: VehicleConfig::default(),
            pedestrians: PedestrianConfig::default(),
            messages: Messages::default(),
        }
    }
}

/// Grid dimensions in cells. Defaults to 20 x 15.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 15,
        }
    }
}

/// Ratio between real and game time. Defaults to one game minute per second, starting at 06:00.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Game minutes that elapse per real second at scale 1.
    pub minutes_per_second: f32,
    /// Minute of the first day at which the clock starts.
    pub start_minute: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            minutes_per_second: 1.0,
            start_minute: 360,
        }
    }
}

/// Time-of-day window with its own spawn interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnWindow {
    /// First minute of the day covered by the window.
    pub start_minute: u32,
    /// Last minute of the day covered by the window (inclusive).
    pub end_minute: u32,
    /// Real-time interval between spawns, in milliseconds.
    pub interval_ms: u64,
}

impl SpawnWindow {
    /// Creates a new window.
    #[must_use]
    pub const fn new(start_minute: u32, end_minute: u32, interval_ms: u64) -> Self {
        Self {
            start_minute,
            end_minute,
            interval_ms,
        }
    }

    /// Reports whether the window covers `minute` (inclusive on both ends).
    #[must_use]
    pub const fn contains(&self, minute: u32) -> bool {
        self.start_minute <= minute && minute <= self.end_minute
    }
}

/// Ordered spawn windows plus the fallback interval. Defaults to a flat 3.5 s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSchedule {
    /// Windows checked in order; the first match wins.
    pub windows: Vec<SpawnWindow>,
    /// Interval used when no window matches, in milliseconds.
    pub default_interval_ms: u64,
}

impl SpawnSchedule {
    /// Schedule with a single flat interval.
    #[must_use]
    pub fn flat(interval: Duration) -> Self {
        Self {
            windows: Vec::new(),
            default_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Resolves the spawn interval in effect at `minute_of_day`.
    #[must_use]
    pub fn interval_at(&self, minute_of_day: u32) -> Duration {
        let millis = self
            .windows
            .iter()
            .find(|window| window.contains(minute_of_day))
            .map_or(self.default_interval_ms, |window| window.interval_ms);
        Duration::from_millis(millis)
    }
}

impl Default for SpawnSchedule {
    fn default() -> Self {
        Self {
            windows: Vec::new(),
            default_interval_ms: 3_500,
        }
    }
}

/// Inclusive range of game minutes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinuteRange {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl MinuteRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Range with its bounds ordered and clamped to be non-negative.
    #[must_use]
    pub fn normalized(self) -> Self {
        let low = self.min.min(self.max).max(0.0);
        let high = self.min.max(self.max).max(0.0);
        Self {
            min: low,
            max: high,
        }
    }
}

/// Vehicle behaviour. Defaults: 60 % parkers, 50 % drivers exit, 4 cells/s, 30-120 minute stays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Probability that a spawned vehicle tries to park.
    pub parker_probability: f64,
    /// Probability that a parked driver walks off.
    pub driver_exit_probability: f64,
    /// Travel speed in cells per real second.
    pub speed: f32,
    /// Parking duration range when the driver stays with the vehicle.
    pub parking_minutes: MinuteRange,
    /// Hourly rates and driver reactions per spot kind.
    pub rates: ParkingRates,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            parker_probability: 0.6,
            driver_exit_probability: 0.5,
            speed: 4.0,
            parking_minutes: MinuteRange::new(30.0, 120.0),
            rates: ParkingRates::default(),
        }
    }
}

/// Rates and driver reactions for one spot kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTier {
    /// Initial hourly rate, in cents.
    pub cents_per_hour: u32,
    /// Rates strictly above this value cost the visit `penalty` rating points.
    pub penalty_threshold: u32,
    /// Rating points deducted when the penalty threshold is exceeded.
    pub penalty: f32,
    /// Rates strictly above this value make drivers refuse to park.
    pub refusal_threshold: u32,
}

impl RateTier {
    fn with_rate(cents_per_hour: u32) -> Self {
        Self {
            cents_per_hour,
            penalty_threshold: cents_per_hour * 2,
            penalty: 40.0,
            refusal_threshold: cents_per_hour * 4,
        }
    }
}

impl Default for RateTier {
    fn default() -> Self {
        Self::with_rate(200)
    }
}

/// Rate tiers split by spot kind. Defaults: meters 2.00/h, booths 1.50/h.
///
/// Fields missing from a configuration file fall back to the default tier of
/// the same spot kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParkingRatesFile")]
pub struct ParkingRates {
    /// Metered spots.
    pub meter: RateTier,
    /// Booth-paid spots.
    pub booth: RateTier,
}

impl ParkingRates {
    /// Tier for the provided spot kind.
    #[must_use]
    pub fn tier(&self, kind: SpotKind) -> &RateTier {
        match kind {
            SpotKind::Meter => &self.meter,
            SpotKind::Booth => &self.booth,
        }
    }
}

impl Default for ParkingRates {
    fn default() -> Self {
        Self {
            meter: RateTier::with_rate(200),
            booth: RateTier::with_rate(150),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ParkingRatesFile {
    meter: RateTierFile,
    booth: RateTierFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RateTierFile {
    cents_per_hour: Option<u32>,
    penalty_threshold: Option<u32>,
    penalty: Option<f32>,
    refusal_threshold: Option<u32>,
}

impl RateTierFile {
    fn or_defaults(self, base: RateTier) -> RateTier {
        RateTier {
            cents_per_hour: self.cents_per_hour.unwrap_or(base.cents_per_hour),
            penalty_threshold: self.penalty_threshold.unwrap_or(base.penalty_threshold),
            penalty: self.penalty.unwrap_or(base.penalty),
            refusal_threshold: self.refusal_threshold.unwrap_or(base.refusal_threshold),
        }
    }
}

impl From<ParkingRatesFile> for ParkingRates {
    fn from(file: ParkingRatesFile) -> Self {
        let defaults = ParkingRates::default();
        Self {
            meter: file.meter.or_defaults(defaults.meter),
            booth: file.booth.or_defaults(defaults.booth),
        }
    }
}

/// Weighted respawn band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RespawnBand {
    /// Relative weight of the band.
    pub weight: f64,
    /// Delay range inside the band.
    pub minutes: MinuteRange,
}

/// Respawn delay after a pedestrian reaches its destination.
///
/// When `bands` is non-empty a band is chosen by weight and the delay drawn
/// uniformly inside it; otherwise the delay is drawn from `minutes`. Defaults
/// to a 20-90 minute uniform range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespawnConfig {
    /// Uniform fallback range.
    pub minutes: MinuteRange,
    /// Optional weighted bands.
    pub bands: Vec<RespawnBand>,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            minutes: MinuteRange::new(20.0, 90.0),
            bands: Vec::new(),
        }
    }
}

/// Relative weights for each need; they need not sum to one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedWeights {
    /// Weight of [`Need::Trash`].
    pub trash: f64,
    /// Weight of [`Need::Thirst`].
    pub thirst: f64,
    /// Weight of [`Need::Toilet`].
    pub toilet: f64,
}

impl NeedWeights {
    /// Weight for the provided need.
    #[must_use]
    pub const fn weight(&self, need: Need) -> f64 {
        match need {
            Need::Trash => self.trash,
            Need::Thirst => self.thirst,
            Need::Toilet => self.toilet,
        }
    }
}

impl Default for NeedWeights {
    fn default() -> Self {
        Self {
            trash: 0.5,
            thirst: 0.3,
            toilet: 0.2,
        }
    }
}

/// Pedestrian behaviour. Defaults: 1.5 cells/s, 30 % need chance, 5 minute fulfilment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedestrianConfig {
    /// Walking speed in cells per real second.
    pub speed: f32,
    /// Respawn delay configuration.
    pub respawn: RespawnConfig,
    /// Probability of generating a need on each leg of the trip.
    pub need_probability: f64,
    /// Relative need weights.
    pub need_weights: NeedWeights,
    /// Game minutes spent at a fixture fulfilling a need.
    pub fulfillment_minutes: f32,
}

impl Default for PedestrianConfig {
    fn default() -> Self {
        Self {
            speed: 1.5,
            respawn: RespawnConfig::default(),
            need_probability: 0.3,
            need_weights: NeedWeights::default(),
            fulfillment_minutes: 5.0,
        }
    }
}

/// Display strings surfaced to the presentation collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// Shown when the challenge is won.
    pub win: String,
    /// Shown when the challenge is lost.
    pub lose: String,
    /// Shown when meter rates trigger penalties.
    pub meter_rate_warning: String,
    /// Shown when booth rates trigger penalties.
    pub booth_rate_warning: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            win: "The lot is thriving.".to_owned(),
            lose: "The lot has closed.".to_owned(),
            meter_rate_warning: "Drivers grumble about the meter prices.".to_owned(),
            booth_rate_warning: "Drivers grumble about the booth prices.".to_owned(),
        }
    }
}

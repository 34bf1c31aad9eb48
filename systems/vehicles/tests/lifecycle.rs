use std::time::Duration;

use parkade_core::{
    AgentOutcome, BorderKind, CellCoord, Command, Edge, Event, FixtureKind, MinuteRange,
    Orientation, ScenarioConfig, SpawnerPair, SpotKind, VehicleConfig, VehicleOutcome,
    VehicleState,
};
use parkade_system_vehicles::{Config, Vehicles};
use parkade_world::{self as world, query, World};

const SPAWN: CellCoord = CellCoord::new(0, 1);
const DESPAWN: CellCoord = CellCoord::new(6, 1);
const SPOT: CellCoord = CellCoord::new(3, 0);

fn parker_config() -> VehicleConfig {
    VehicleConfig {
        parker_probability: 1.0,
        driver_exit_probability: 0.0,
        parking_minutes: MinuteRange::new(30.0, 30.0),
        ..VehicleConfig::default()
    }
}

struct Harness {
    world: World,
    vehicles: Vehicles,
    log: Vec<Event>,
}

impl Harness {
    fn new(config: VehicleConfig, spots: &[CellCoord]) -> Self {
        let mut harness = Self {
            world: World::from_scenario(&ScenarioConfig::with_grid(7, 3)),
            vehicles: Vehicles::new(Config::new(config, 0xfeed)),
            log: Vec::new(),
        };
        harness.apply(Command::AddVehicleSpawner {
            pair: SpawnerPair::new(SPAWN, DESPAWN),
        });
        for spot in spots {
            harness.apply(Command::PlaceFixture {
                kind: FixtureKind::ParkingSpot,
                anchor: *spot,
                orientation: Orientation::NORTH,
            });
        }
        harness.log.clear();
        harness
    }

    fn apply(&mut self, command: Command) {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        self.pump(events);
    }

    fn pump(&mut self, mut events: Vec<Event>) {
        while !events.is_empty() {
            self.log.extend(events.iter().cloned());
            let mut commands = Vec::new();
            self.vehicles.handle(&events, &self.world, &mut commands);
            events.clear();
            for command in commands {
                world::apply(&mut self.world, command, &mut events);
            }
        }
    }

    fn spawn(&mut self) {
        self.apply(Command::SpawnVehicle {
            pair: SpawnerPair::new(SPAWN, DESPAWN),
        });
    }

    fn run_seconds(&mut self, seconds: u32) {
        for _ in 0..seconds {
            self.apply(Command::Tick {
                dt: Duration::from_secs(1),
            });
        }
    }

    fn vehicle_outcomes(&self) -> Vec<VehicleOutcome> {
        self.log
            .iter()
            .filter_map(|event| match event {
                Event::OutcomeReported {
                    outcome: AgentOutcome::Vehicle { outcome, .. },
                } => Some(*outcome),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.log.iter().filter(|event| predicate(event)).count()
    }
}

#[test]
fn parker_reserves_parks_pays_and_leaves() {
    let mut harness = Harness::new(parker_config(), &[SPOT]);
    let money_before = query::money(&harness.world);

    harness.spawn();
    assert_eq!(query::reservation_holder(&harness.world, SPOT).map(|id| id.get()), Some(0));

    harness.run_seconds(2);
    let parked = harness.vehicles.snapshots();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].state, VehicleState::Parking);
    assert_eq!(parked[0].cell, SPOT);

    harness.run_seconds(40);
    let fees: Vec<u64> = harness
        .log
        .iter()
        .filter_map(|event| match event {
            Event::ParkingFeeCollected { cents, .. } => Some(*cents),
            _ => None,
        })
        .collect();
    assert_eq!(fees, vec![75]);
    assert_eq!(query::money(&harness.world) - money_before, 75);
    assert_eq!(harness.vehicle_outcomes(), vec![VehicleOutcome::Parked]);
    assert_eq!(
        harness.count(|event| matches!(event, Event::VehicleDespawned { .. })),
        1
    );
    assert!(harness.vehicles.snapshots().is_empty());
    assert!(query::reservation_holder(&harness.world, SPOT).is_none());
}

#[test]
fn excessive_rate_is_refused() {
    let mut harness = Harness::new(parker_config(), &[SPOT]);
    harness.apply(Command::SetParkingRate {
        kind: SpotKind::Booth,
        cents_per_hour: 1_000,
    });

    harness.spawn();
    harness.run_seconds(10);

    assert_eq!(harness.vehicle_outcomes(), vec![VehicleOutcome::FailedToPark]);
    assert_eq!(
        harness.count(|event| matches!(event, Event::ParkingFeeCollected { .. })),
        0
    );
    assert!(harness.vehicles.snapshots().is_empty());
}

#[test]
fn expensive_rate_parks_with_penalty() {
    let mut harness = Harness::new(parker_config(), &[SPOT]);
    let penalty = parker_config().rates.booth.penalty;
    harness.apply(Command::SetParkingRate {
        kind: SpotKind::Booth,
        cents_per_hour: 400,
    });

    harness.spawn();
    harness.run_seconds(45);

    assert_eq!(
        harness.vehicle_outcomes(),
        vec![VehicleOutcome::ParkedWithPenalty { penalty }]
    );
}

#[test]
fn contended_spot_goes_to_a_single_vehicle() {
    let mut harness = Harness::new(parker_config(), &[SPOT]);
    harness.spawn();
    harness.spawn();
    harness.run_seconds(45);

    assert_eq!(
        harness.count(|event| matches!(event, Event::SpotReserved { .. })),
        1
    );
    let mut outcomes = harness.vehicle_outcomes();
    outcomes.sort_by_key(|outcome| matches!(outcome, VehicleOutcome::Parked));
    assert_eq!(
        outcomes,
        vec![VehicleOutcome::FailedToPark, VehicleOutcome::Parked]
    );
}

#[test]
fn non_parkers_drive_through_without_an_outcome() {
    let config = VehicleConfig {
        parker_probability: 0.0,
        ..parker_config()
    };
    let mut harness = Harness::new(config, &[SPOT]);
    harness.spawn();

    let snapshot = harness.vehicles.snapshots().remove(0);
    assert_eq!(snapshot.state, VehicleState::Moving);
    assert!(!snapshot.potential_parker);

    harness.run_seconds(3);
    assert!(harness.vehicle_outcomes().is_empty());
    assert_eq!(
        harness.count(|event| matches!(event, Event::VehicleDespawned { .. })),
        1
    );
    assert!(query::reservation_holder(&harness.world, SPOT).is_none());
}

#[test]
fn stranded_parker_is_removed_and_reported_failed() {
    let mut harness = Harness::new(parker_config(), &[]);
    for row in 0..3 {
        harness.apply(Command::SetBorderSegment {
            cell: CellCoord::new(2, row),
            edge: Edge::East,
            kind: BorderKind::Fence,
        });
    }

    harness.spawn();

    assert_eq!(harness.vehicle_outcomes(), vec![VehicleOutcome::FailedToPark]);
    assert!(harness.vehicles.snapshots().is_empty());
}

#[test]
fn removed_spot_sends_the_vehicle_home() {
    let mut harness = Harness::new(parker_config(), &[SPOT]);
    harness.spawn();
    harness.apply(Command::RemoveFixture { cell: SPOT });

    assert_eq!(harness.vehicle_outcomes(), Vec::new());
    let snapshot = harness.vehicles.snapshots().remove(0);
    assert_eq!(snapshot.reserved_spot, None);

    harness.run_seconds(5);
    assert_eq!(harness.vehicle_outcomes(), vec![VehicleOutcome::FailedToPark]);
}

#[test]
fn driver_exit_holds_the_vehicle_until_the_pedestrian_returns() {
    let config = VehicleConfig {
        driver_exit_probability: 1.0,
        ..parker_config()
    };
    let mut harness = Harness::new(config, &[SPOT]);
    harness.spawn();
    harness.run_seconds(60);

    let pedestrian = harness
        .log
        .iter()
        .find_map(|event| match event {
            Event::PedestrianSpawned {
                pedestrian,
                vehicle,
                cell,
            } => Some((*pedestrian, *vehicle, *cell)),
            _ => None,
        })
        .expect("driver stepped out");
    assert_eq!(pedestrian.2, SPOT);
    assert_eq!(
        harness.vehicles.snapshots()[0].state,
        VehicleState::Parking,
        "vehicle must wait for its driver"
    );

    harness.apply(Command::ReturnPedestrian {
        pedestrian: pedestrian.0,
        vehicle: pedestrian.1,
    });
    harness.run_seconds(3);

    let fees: Vec<u64> = harness
        .log
        .iter()
        .filter_map(|event| match event {
            Event::ParkingFeeCollected { cents, .. } => Some(*cents),
            _ => None,
        })
        .collect();
    assert_eq!(fees.len(), 1);
    assert!(fees[0] > 75, "fee covers the whole wait");
    assert_eq!(harness.vehicle_outcomes(), vec![VehicleOutcome::Parked]);
}

#[test]
fn grid_reset_discards_every_vehicle() {
    let mut harness = Harness::new(parker_config(), &[SPOT]);
    harness.spawn();
    harness.spawn();
    assert_eq!(harness.vehicles.snapshots().len(), 2);

    harness.apply(Command::ConfigureGrid {
        width: 7,
        height: 3,
    });
    assert!(harness.vehicles.snapshots().is_empty());
}

//! Parking-spot reservation ledger.

use std::collections::BTreeMap;

use parkade_core::{CellCoord, VehicleId};

/// Maps each reserved spot to the single vehicle holding it.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReservationLedger {
    holders: BTreeMap<CellCoord, VehicleId>,
}

impl ReservationLedger {
    /// Creates an empty ledger.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claims the spot unless another vehicle already holds it.
    ///
    /// Re-reserving a spot the vehicle already holds succeeds. On contention
    /// the current holder is returned.
    pub(crate) fn try_reserve(
        &mut self,
        spot: CellCoord,
        vehicle: VehicleId,
    ) -> Result<(), VehicleId> {
        match self.holders.get(&spot) {
            Some(holder) if *holder != vehicle => Err(*holder),
            Some(_) => Ok(()),
            None => {
                let _ = self.holders.insert(spot, vehicle);
                Ok(())
            }
        }
    }

    /// Releases the spot if `vehicle` holds it.
    pub(crate) fn release(&mut self, spot: CellCoord, vehicle: VehicleId) -> bool {
        if self.holders.get(&spot) == Some(&vehicle) {
            let _ = self.holders.remove(&spot);
            true
        } else {
            false
        }
    }

    /// Releases the spot regardless of holder, returning the previous holder.
    pub(crate) fn release_spot(&mut self, spot: CellCoord) -> Option<VehicleId> {
        self.holders.remove(&spot)
    }

    /// Releases every spot held by the vehicle, returning them in ascending order.
    pub(crate) fn release_vehicle(&mut self, vehicle: VehicleId) -> Vec<CellCoord> {
        let spots: Vec<CellCoord> = self
            .holders
            .iter()
            .filter(|(_, holder)| **holder == vehicle)
            .map(|(spot, _)| *spot)
            .collect();
        for spot in &spots {
            let _ = self.holders.remove(spot);
        }
        spots
    }

    /// Vehicle currently holding the spot.
    pub(crate) fn holder(&self, spot: CellCoord) -> Option<VehicleId> {
        self.holders.get(&spot).copied()
    }

    /// Drops every reservation.
    pub(crate) fn clear(&mut self) {
        self.holders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_vehicle_is_rejected_with_holder() {
        let mut ledger = ReservationLedger::new();
        let spot = CellCoord::new(2, 3);
        let first = VehicleId::new(1);
        let second = VehicleId::new(2);

        assert_eq!(ledger.try_reserve(spot, first), Ok(()));
        assert_eq!(ledger.try_reserve(spot, second), Err(first));
        assert_eq!(ledger.try_reserve(spot, first), Ok(()));
        assert_eq!(ledger.holder(spot), Some(first));
    }

    #[test]
    fn release_requires_the_holder() {
        let mut ledger = ReservationLedger::new();
        let spot = CellCoord::new(0, 0);
        let holder = VehicleId::new(4);
        let _ = ledger.try_reserve(spot, holder);

        assert!(!ledger.release(spot, VehicleId::new(5)));
        assert!(ledger.release(spot, holder));
        assert_eq!(ledger.holder(spot), None);
    }

    #[test]
    fn vehicle_release_frees_all_of_its_spots() {
        let mut ledger = ReservationLedger::new();
        let vehicle = VehicleId::new(7);
        let _ = ledger.try_reserve(CellCoord::new(3, 0), vehicle);
        let _ = ledger.try_reserve(CellCoord::new(1, 0), vehicle);
        let _ = ledger.try_reserve(CellCoord::new(2, 0), VehicleId::new(8));

        assert_eq!(
            ledger.release_vehicle(vehicle),
            vec![CellCoord::new(1, 0), CellCoord::new(3, 0)]
        );
        assert_eq!(ledger.release_spot(CellCoord::new(2, 0)), Some(VehicleId::new(8)));
    }
}

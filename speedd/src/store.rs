use crate::models::Observation;
use crate::types::PlateNumber;
use std::collections::HashMap;
use std::sync::Mutex;

/// Append-only record of every plate sighting. Observations are never
/// mutated or removed, so the archive grows for the lifetime of the
/// process.
#[derive(Default)]
pub(crate) struct ObservationStore {
    observations: Mutex<HashMap<PlateNumber, Vec<Observation>>>,
}

impl ObservationStore {
    pub(crate) fn append(&self, observation: Observation) {
        let mut observations = self.observations.lock().unwrap();
        observations
            .entry(observation.plate.clone())
            .or_default()
            .push(observation);
    }

    /// A stable copy of the plate's history, safe to iterate while other
    /// cameras keep appending.
    pub(crate) fn snapshot(&self, plate: &[u8]) -> Vec<Observation> {
        let observations = self.observations.lock().unwrap();
        observations.get(plate).cloned().unwrap_or_default()
    }
}

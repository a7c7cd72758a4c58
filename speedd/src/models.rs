use crate::types::{Centimph, Day, MileMarker, PlateNumber, RoadId, SpeedLimit, Timestamp};
use crate::DAY_IN_SECONDS;
use std::ops::RangeInclusive;

/// A single plate sighting, stamped with the reporting camera's fixed
/// position and limit. Never mutated or removed once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Observation {
    pub(crate) plate: PlateNumber,
    pub(crate) road: RoadId,
    pub(crate) mile: MileMarker,
    pub(crate) limit: SpeedLimit,
    pub(crate) timestamp: Timestamp,
}

impl Observation {
    /// Average speed between two sightings of the same plate, in mph.
    /// `None` when the sightings are on different roads or share a
    /// timestamp (a degenerate pair).
    pub(crate) fn average_mph(&self, other: &Self) -> Option<f64> {
        if self.road != other.road {
            return None;
        }
        let duration = self.timestamp.abs_diff(other.timestamp);
        if duration == 0 {
            return None;
        }
        let distance = self.mile.abs_diff(other.mile);
        Some(f64::from(distance) / f64::from(duration) * 3600.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) plate: PlateNumber,
    pub(crate) road: RoadId,
    pub(crate) mile1: MileMarker,
    pub(crate) timestamp1: Timestamp,
    pub(crate) mile2: MileMarker,
    pub(crate) timestamp2: Timestamp,
    pub(crate) speed: Centimph,
}

impl Ticket {
    pub(crate) fn from_observations(a: &Observation, b: &Observation, mph: f64) -> Self {
        let (earlier, later) = if a.timestamp <= b.timestamp { (a, b) } else { (b, a) };
        Self {
            plate: earlier.plate.clone(),
            road: earlier.road,
            mile1: earlier.mile,
            timestamp1: earlier.timestamp,
            mile2: later.mile,
            timestamp2: later.timestamp,
            speed: (mph * 100.0).round().min(f64::from(Centimph::MAX)) as Centimph,
        }
    }

    /// Every day the ticket's span touches. A plate may be ticketed at most
    /// once per day, so committing a ticket consumes all of these.
    pub(crate) fn days(&self) -> RangeInclusive<Day> {
        (self.timestamp1 / DAY_IN_SECONDS)..=(self.timestamp2 / DAY_IN_SECONDS)
    }
}

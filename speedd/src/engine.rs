use crate::models::{Observation, Ticket};
use crate::registry::DispatcherRegistry;
use crate::store::ObservationStore;
use crate::types::{Day, PlateNumber};
use crate::SPEED_ERROR_MARGIN;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

/// Record of every `(plate, day)` a ticket has ever been committed for.
/// The check-and-claim is one critical section so overlapping candidates
/// can never double-ticket a day.
#[derive(Default)]
pub(crate) struct TicketLedger {
    days: Mutex<HashMap<PlateNumber, HashSet<Day>>>,
}

impl TicketLedger {
    /// Claim every day in the span for the plate. Fails without claiming
    /// anything if any day in the span was already taken.
    pub(crate) fn claim(&self, plate: &[u8], days: RangeInclusive<Day>) -> bool {
        let mut ledger = self.days.lock().unwrap();
        let claimed = ledger.entry(plate.to_vec()).or_default();
        if days.clone().any(|day| claimed.contains(&day)) {
            return false;
        }
        claimed.extend(days);
        true
    }
}

/// Sole consumer of newly recorded observations. Every new sighting is
/// paired against the plate's full same-road history, so a late-arriving
/// observation can still produce a ticket for an old crossing.
pub(crate) struct TicketEngine {
    store: Arc<ObservationStore>,
    registry: Arc<DispatcherRegistry>,
    ledger: TicketLedger,
}

impl TicketEngine {
    pub(crate) fn new(store: Arc<ObservationStore>, registry: Arc<DispatcherRegistry>) -> Self {
        Self {
            store,
            registry,
            ledger: TicketLedger::default(),
        }
    }

    pub(crate) fn run(self, observations: Receiver<Observation>) {
        debug!("ticket engine started");
        while let Ok(observation) = observations.recv() {
            self.process(observation);
        }
        debug!("ticket engine stopped");
    }

    fn process(&self, observation: Observation) {
        let history = self.store.snapshot(&observation.plate);
        for ticket in candidates(&observation, &history) {
            if !self.ledger.claim(&ticket.plate, ticket.days()) {
                debug!(
                    "plate {}: ticket days {:?} already consumed, skipping",
                    String::from_utf8_lossy(&ticket.plate),
                    ticket.days(),
                );
                continue;
            }
            info!(
                "plate {}: ticketed on road {} at {} centimph",
                String::from_utf8_lossy(&ticket.plate),
                ticket.road,
                ticket.speed,
            );
            self.registry.dispatch(ticket);
        }
    }
}

/// All above-threshold pairings of the new observation with the plate's
/// history, in history order.
fn candidates(observation: &Observation, history: &[Observation]) -> Vec<Ticket> {
    history
        .iter()
        .filter(|prior| *prior != observation)
        .filter_map(|prior| observation.average_mph(prior).map(|mph| (prior, mph)))
        .filter(|(_, mph)| *mph >= f64::from(observation.limit) + SPEED_ERROR_MARGIN)
        .map(|(prior, mph)| Ticket::from_observations(observation, prior, mph))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MileMarker, Timestamp};

    fn observation(mile: MileMarker, timestamp: Timestamp) -> Observation {
        Observation {
            plate: b"UN1X".to_vec(),
            road: 1,
            mile,
            limit: 60,
            timestamp,
        }
    }

    #[test]
    fn no_candidate_from_a_single_observation() {
        let new = observation(0, 0);
        assert!(candidates(&new, &[new.clone()]).is_empty());
    }

    #[test]
    fn at_the_limit_is_not_a_candidate() {
        let new = observation(1, 60);
        let history = vec![observation(0, 0), new.clone()];
        // Exactly 60 mph against a limit of 60.
        assert!(candidates(&new, &history).is_empty());
    }

    #[test]
    fn half_a_mph_over_is_a_candidate() {
        // 121 miles in 7200 seconds is exactly 60.5 mph.
        let new = observation(121, 7200);
        let history = vec![observation(0, 0), new.clone()];
        let tickets = candidates(&new, &history);
        assert_eq!(1, tickets.len());
        assert_eq!(6050, tickets[0].speed);
    }

    #[test]
    fn speeding_yields_a_ticket_with_ordered_endpoints() {
        let new = observation(1, 45);
        let history = vec![observation(0, 0), new.clone()];
        let tickets = candidates(&new, &history);
        assert_eq!(1, tickets.len());
        let ticket = &tickets[0];
        assert_eq!((0, 0, 1, 45, 8000), (
            ticket.mile1,
            ticket.timestamp1,
            ticket.mile2,
            ticket.timestamp2,
            ticket.speed,
        ));
    }

    #[test]
    fn other_roads_are_ignored() {
        let new = observation(1, 45);
        let mut elsewhere = observation(0, 0);
        elsewhere.road = 2;
        assert!(candidates(&new, &[elsewhere, new.clone()]).is_empty());
    }

    #[test]
    fn hindsight_pairs_against_the_whole_history() {
        let new = observation(2, 90);
        let history = vec![observation(0, 0), observation(1, 45), new.clone()];
        // 80 mph against both priors.
        assert_eq!(2, candidates(&new, &history).len());
    }

    #[test]
    fn ledger_claims_are_exclusive_per_day() {
        let ledger = TicketLedger::default();
        assert!(ledger.claim(b"UN1X", 0..=1));
        assert!(!ledger.claim(b"UN1X", 1..=1));
        assert!(!ledger.claim(b"UN1X", 1..=3));
        assert!(ledger.claim(b"UN1X", 2..=3));
    }

    #[test]
    fn failed_claims_consume_nothing() {
        let ledger = TicketLedger::default();
        assert!(ledger.claim(b"UN1X", 2..=2));
        assert!(!ledger.claim(b"UN1X", 0..=2));
        // Days 0 and 1 must still be free after the failed span claim.
        assert!(ledger.claim(b"UN1X", 0..=1));
    }

    #[test]
    fn ledger_tracks_plates_independently() {
        let ledger = TicketLedger::default();
        assert!(ledger.claim(b"UN1X", 0..=0));
        assert!(ledger.claim(b"RE05BKG", 0..=0));
    }
}

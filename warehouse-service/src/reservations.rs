use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use common_protocol::GoodAmount;
use uuid::Uuid;

/// Wall-clock lifetime of an open reservation (spec §6). Matches the reservations
/// stream's `MaxAge` so a broker-bounded reboot can never replay an already-expired
/// reservation (spec §9).
pub const RESERVATION_TIMEOUT: Duration = Duration::minutes(30);

/// An accepted, not-yet-committed-or-expired reservation, as tracked in memory after
/// being observed on `reservations.<wh>` (spec §4.3's `Open` state).
#[derive(Debug, Clone)]
pub struct OpenReservation {
    pub id: Uuid,
    pub items: Vec<GoodAmount>,
    pub stream_sequence: u64,
    pub published_at: DateTime<Utc>,
}

impl OpenReservation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.published_at + RESERVATION_TIMEOUT <= now
    }
}

/// The open-reservation list, keyed by reservation-id for O(1) lookup on order arrival
/// (spec §9's named redesign over the source's linear scan).
#[derive(Debug, Default)]
pub struct ReservationBook {
    open: HashMap<Uuid, OpenReservation>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reservation: OpenReservation) {
        self.open.insert(reservation.id, reservation);
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<OpenReservation> {
        self.open.remove(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&OpenReservation> {
        self.open.get(id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Remove and return every reservation whose deadline has passed. The source's
    /// predicate was inverted (`.After` where `.Before` was meant); this drops a
    /// reservation once `published_at + RESERVATION_TIMEOUT <= now` (spec §9).
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<OpenReservation> {
        let expired: Vec<Uuid> = self
            .open
            .iter()
            .filter(|(_, r)| r.is_expired(now))
            .map(|(id, _)| *id)
            .collect();
        expired.into_iter().filter_map(|id| self.open.remove(&id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(id: Uuid, published_at: DateTime<Utc>) -> OpenReservation {
        OpenReservation {
            id,
            items: vec![GoodAmount::new("g1", 4)],
            stream_sequence: 1,
            published_at,
        }
    }

    #[test]
    fn lookup_by_id_is_direct() {
        let mut book = ReservationBook::new();
        let id = Uuid::new_v4();
        book.insert(reservation(id, Utc::now()));
        assert!(book.get(&id).is_some());
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn sweep_drops_only_expired_reservations() {
        let mut book = ReservationBook::new();
        let fresh_id = Uuid::new_v4();
        let stale_id = Uuid::new_v4();
        book.insert(reservation(fresh_id, Utc::now()));
        book.insert(reservation(stale_id, Utc::now() - Duration::minutes(31)));

        let expired = book.sweep_expired(Utc::now());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale_id);
        assert!(book.get(&fresh_id).is_some());
        assert!(book.get(&stale_id).is_none());
    }

    #[test]
    fn reservation_exactly_at_deadline_is_expired() {
        let id = Uuid::new_v4();
        let published_at = Utc::now() - RESERVATION_TIMEOUT;
        let r = reservation(id, published_at);
        assert!(r.is_expired(Utc::now()));
    }
}

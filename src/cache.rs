use crate::constants::{ADMIN_CACHE_TTL_SECS, PUBLIC_CACHE_TTL_SECS};
use crate::domain::{Academy, Event, Registration};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// TTL-bounded in-memory mirror of the three remote collections.
///
/// The cache is a read replica only: it is populated by [`CacheStore::update`]
/// after a successful joint load and cleared by [`CacheStore::invalidate`]
/// after any local mutation. Snapshots are owned copies; callers must treat
/// them as immutable.
pub struct CacheStore {
    events: HashMap<Uuid, Event>,
    registrations: HashMap<Uuid, Registration>,
    academies: HashMap<Uuid, Academy>,
    last_refreshed_at: Option<Instant>,
    ttl: Duration,
}

/// Owned copy of the cached collections, sorted for deterministic output.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub events: Vec<Event>,
    pub registrations: Vec<Registration>,
    pub academies: Vec<Academy>,
}

impl CacheStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            events: HashMap::new(),
            registrations: HashMap::new(),
            academies: HashMap::new(),
            last_refreshed_at: None,
            ttl,
        }
    }

    /// Staleness tolerance of the administrative view.
    pub fn admin() -> Self {
        Self::with_ttl(Duration::from_secs(ADMIN_CACHE_TTL_SECS))
    }

    /// Staleness tolerance of the public listing.
    pub fn public() -> Self {
        Self::with_ttl(Duration::from_secs(PUBLIC_CACHE_TTL_SECS))
    }

    /// True iff the last refresh is within the TTL and events were loaded.
    pub fn is_valid(&self) -> bool {
        match self.last_refreshed_at {
            Some(stamp) => stamp.elapsed() < self.ttl && !self.events.is_empty(),
            None => false,
        }
    }

    /// Replaces all three mirrors at once and stamps the refresh clock.
    pub fn update(
        &mut self,
        events: Vec<Event>,
        registrations: Vec<Registration>,
        academies: Vec<Academy>,
    ) {
        self.events.clear();
        self.registrations.clear();
        self.academies.clear();

        for event in events {
            if let Some(id) = event.id {
                self.events.insert(id, event);
            }
        }
        for registration in registrations {
            if let Some(id) = registration.id {
                self.registrations.insert(id, registration);
            }
        }
        for academy in academies {
            if let Some(id) = academy.id {
                self.academies.insert(id, academy);
            }
        }

        self.last_refreshed_at = Some(Instant::now());
        debug!(
            events = self.events.len(),
            registrations = self.registrations.len(),
            academies = self.academies.len(),
            "Cache refreshed"
        );
    }

    pub fn invalidate(&mut self) {
        self.events.clear();
        self.registrations.clear();
        self.academies.clear();
        self.last_refreshed_at = None;
        debug!("Cache invalidated");
    }

    /// True when the cache holds data from some past refresh, valid or not.
    pub fn has_snapshot(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn events(&self) -> Vec<Event> {
        self.snapshot().events
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.snapshot().registrations
    }

    pub fn academies(&self) -> Vec<Academy> {
        self.snapshot().academies
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let mut events: Vec<Event> = self.events.values().cloned().collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));

        let mut registrations: Vec<Registration> = self.registrations.values().cloned().collect();
        registrations.sort_by_key(|r| r.created_at);

        let mut academies: Vec<Academy> = self.academies.values().cloned().collect();
        academies.sort_by(|a, b| a.name.cmp(&b.name));

        CacheSnapshot {
            events,
            registrations,
            academies,
        }
    }
}

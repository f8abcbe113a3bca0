use crate::domain::{Academy, Event, Registration};
use crate::error::{ArenaError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Narrow contract over the managed document database.
///
/// Only single-field equality queries plus one date-range filter are
/// required; anything richer stays out of the contract on purpose.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // Event operations
    async fn create_event(&self, event: &mut Event) -> Result<()>;
    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>>;
    async fn update_event(&self, event: &Event) -> Result<()>;
    async fn list_events(&self) -> Result<Vec<Event>>;
    async fn upcoming_events(&self, after: NaiveDate) -> Result<Vec<Event>>;
    /// Batched delete of the event and every registration referencing it.
    async fn delete_event_cascade(&self, event_id: Uuid) -> Result<usize>;

    // Registration operations
    async fn create_registration(&self, registration: &mut Registration) -> Result<()>;
    async fn get_registration(&self, registration_id: Uuid) -> Result<Option<Registration>>;
    async fn update_registration(&self, registration: &Registration) -> Result<()>;
    async fn list_registrations(&self) -> Result<Vec<Registration>>;
    async fn registrations_by_event(&self, event_id: Uuid) -> Result<Vec<Registration>>;
    async fn registrations_by_academy(&self, academy_id: Uuid) -> Result<Vec<Registration>>;

    // Academy operations
    async fn create_academy(&self, academy: &mut Academy) -> Result<()>;
    async fn get_academy(&self, academy_id: Uuid) -> Result<Option<Academy>>;
    async fn list_academies(&self) -> Result<Vec<Academy>>;
    async fn academy_by_abbreviation(&self, abbreviation: &str) -> Result<Option<Academy>>;
}

/// In-memory document store for development and testing.
pub struct InMemoryStore {
    events: Arc<Mutex<HashMap<Uuid, Event>>>,
    registrations: Arc<Mutex<HashMap<Uuid, Registration>>>,
    academies: Arc<Mutex<HashMap<Uuid, Academy>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
            registrations: Arc::new(Mutex::new(HashMap::new())),
            academies: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seeds pre-built collections, keeping their ids so foreign keys in
    /// fixture files stay intact.
    pub fn seed(
        &self,
        events: Vec<Event>,
        registrations: Vec<Registration>,
        academies: Vec<Academy>,
    ) {
        let mut event_map = self.events.lock().unwrap();
        for event in events {
            let id = event.id.unwrap_or_else(Uuid::new_v4);
            event_map.insert(id, Event { id: Some(id), ..event });
        }
        let mut registration_map = self.registrations.lock().unwrap();
        for registration in registrations {
            let id = registration.id.unwrap_or_else(Uuid::new_v4);
            registration_map.insert(id, Registration { id: Some(id), ..registration });
        }
        let mut academy_map = self.academies.lock().unwrap();
        for academy in academies {
            let id = academy.id.unwrap_or_else(Uuid::new_v4);
            academy_map.insert(id, Academy { id: Some(id), ..academy });
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_event(&self, event: &mut Event) -> Result<()> {
        let id = Uuid::new_v4();
        event.id = Some(id);

        let mut events = self.events.lock().unwrap();
        events.insert(id, event.clone());

        debug!("Created event: {} with id {}", event.name, id);
        Ok(())
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>> {
        let events = self.events.lock().unwrap();
        Ok(events.get(&event_id).cloned())
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        let event_id = event
            .id
            .ok_or_else(|| ArenaError::Validation("Cannot update event without ID".to_string()))?;

        let mut events = self.events.lock().unwrap();
        if !events.contains_key(&event_id) {
            return Err(ArenaError::NotFound(format!("event {}", event_id)));
        }
        events.insert(event_id, event.clone());

        debug!("Updated event: {} with id {}", event.name, event_id);
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap();
        let mut all_events: Vec<Event> = events.values().cloned().collect();
        all_events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        Ok(all_events)
    }

    async fn upcoming_events(&self, after: NaiveDate) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap();
        let mut upcoming: Vec<Event> = events
            .values()
            .filter(|e| e.date > after)
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(upcoming)
    }

    async fn delete_event_cascade(&self, event_id: Uuid) -> Result<usize> {
        // Both maps are locked for the whole batch so no reader observes
        // the event gone while its registrations remain.
        let mut events = self.events.lock().unwrap();
        let mut registrations = self.registrations.lock().unwrap();

        if events.remove(&event_id).is_none() {
            return Err(ArenaError::NotFound(format!("event {}", event_id)));
        }

        let doomed: Vec<Uuid> = registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .filter_map(|r| r.id)
            .collect();
        for id in &doomed {
            registrations.remove(id);
        }

        debug!(
            "Deleted event {} and {} registrations",
            event_id,
            doomed.len()
        );
        Ok(doomed.len())
    }

    async fn create_registration(&self, registration: &mut Registration) -> Result<()> {
        let id = Uuid::new_v4();
        registration.id = Some(id);

        let mut registrations = self.registrations.lock().unwrap();
        registrations.insert(id, registration.clone());

        debug!(
            "Created registration for event {} with id {}",
            registration.event_id, id
        );
        Ok(())
    }

    async fn get_registration(&self, registration_id: Uuid) -> Result<Option<Registration>> {
        let registrations = self.registrations.lock().unwrap();
        Ok(registrations.get(&registration_id).cloned())
    }

    async fn update_registration(&self, registration: &Registration) -> Result<()> {
        let registration_id = registration.id.ok_or_else(|| {
            ArenaError::Validation("Cannot update registration without ID".to_string())
        })?;

        let mut registrations = self.registrations.lock().unwrap();
        if !registrations.contains_key(&registration_id) {
            return Err(ArenaError::NotFound(format!(
                "registration {}",
                registration_id
            )));
        }
        registrations.insert(registration_id, registration.clone());

        debug!("Updated registration with id {}", registration_id);
        Ok(())
    }

    async fn list_registrations(&self) -> Result<Vec<Registration>> {
        let registrations = self.registrations.lock().unwrap();
        let mut all: Vec<Registration> = registrations.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }

    async fn registrations_by_event(&self, event_id: Uuid) -> Result<Vec<Registration>> {
        let registrations = self.registrations.lock().unwrap();
        let mut matching: Vec<Registration> = registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn registrations_by_academy(&self, academy_id: Uuid) -> Result<Vec<Registration>> {
        let registrations = self.registrations.lock().unwrap();
        let mut matching: Vec<Registration> = registrations
            .values()
            .filter(|r| r.academy_id == academy_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn create_academy(&self, academy: &mut Academy) -> Result<()> {
        let id = Uuid::new_v4();
        academy.id = Some(id);

        let mut academies = self.academies.lock().unwrap();
        academies.insert(id, academy.clone());

        debug!("Created academy: {} with id {}", academy.name, id);
        Ok(())
    }

    async fn get_academy(&self, academy_id: Uuid) -> Result<Option<Academy>> {
        let academies = self.academies.lock().unwrap();
        Ok(academies.get(&academy_id).cloned())
    }

    async fn list_academies(&self) -> Result<Vec<Academy>> {
        let academies = self.academies.lock().unwrap();
        let mut all: Vec<Academy> = academies.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn academy_by_abbreviation(&self, abbreviation: &str) -> Result<Option<Academy>> {
        let academies = self.academies.lock().unwrap();
        let academy = academies
            .values()
            .find(|a| a.abbreviation.eq_ignore_ascii_case(abbreviation))
            .cloned();
        Ok(academy)
    }
}

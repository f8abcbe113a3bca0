//! Portal facade: the one place that wires the document store, the cache,
//! and the engines together. Constructed with explicit dependencies; no
//! ambient globals.

use crate::aggregation::{
    self, AcademyWithCounts, EventRoster, EventWithCounts, OverallStats,
};
use crate::attachments::{AttachmentPipeline, UploadOutcome};
use crate::cache::{CacheSnapshot, CacheStore};
use crate::constants::MAX_ABBREVIATION_LEN;
use crate::domain::{is_valid_national_id, Academy, Event};
use crate::error::{ArenaError, Result};
use crate::form::RegistrationFormModel;
use crate::poomsae::PoomsaeTable;
use crate::store::DocumentStore;
use chrono::{NaiveDate, Utc};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct PortalService {
    store: Arc<dyn DocumentStore>,
    cache: Mutex<CacheStore>,
    attachments: AttachmentPipeline,
    poomsae: PoomsaeTable,
}

impl PortalService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: CacheStore,
        attachments: AttachmentPipeline,
        poomsae: PoomsaeTable,
    ) -> Self {
        Self {
            store,
            cache: Mutex::new(cache),
            attachments,
            poomsae,
        }
    }

    pub fn poomsae_table(&self) -> &PoomsaeTable {
        &self.poomsae
    }

    /// Serves the three collections, from cache when still valid.
    ///
    /// The remote reads are issued concurrently and combined only when all
    /// three succeed; a partial failure aborts the refresh and the previous
    /// snapshot, if any, keeps being served in degraded mode.
    #[instrument(skip(self))]
    pub async fn load_portal_data(&self) -> Result<CacheSnapshot> {
        {
            let cache = self.cache.lock().unwrap();
            if cache.is_valid() {
                return Ok(cache.snapshot());
            }
        }

        let loaded = tokio::try_join!(
            self.store.list_events(),
            self.store.list_registrations(),
            self.store.list_academies(),
        );

        match loaded {
            Ok((events, registrations, academies)) => {
                let mut cache = self.cache.lock().unwrap();
                cache.update(events, registrations, academies);
                Ok(cache.snapshot())
            }
            Err(e) => {
                let cache = self.cache.lock().unwrap();
                if cache.has_snapshot() {
                    warn!("Joint load failed, serving previous snapshot: {}", e);
                    Ok(cache.snapshot())
                } else {
                    Err(e)
                }
            }
        }
    }

    pub fn invalidate_cache(&self) {
        self.cache.lock().unwrap().invalidate();
    }

    /// Creates or updates an event after validating its dates.
    #[instrument(skip(self, event), fields(name = %event.name))]
    pub async fn save_event(&self, event: &mut Event, today: NaiveDate) -> Result<()> {
        if event.name.trim().is_empty() {
            return Err(ArenaError::Validation("event name is required".to_string()));
        }
        if event.venue.trim().is_empty() {
            return Err(ArenaError::Validation("event venue is required".to_string()));
        }
        if event.date < today {
            return Err(ArenaError::Validation(
                "event date cannot be in the past".to_string(),
            ));
        }
        if let Some(deadline) = event.registration_deadline {
            if deadline >= event.date {
                return Err(ArenaError::Validation(
                    "registration deadline must fall before the event date".to_string(),
                ));
            }
            if deadline < today {
                return Err(ArenaError::Validation(
                    "registration deadline cannot be in the past".to_string(),
                ));
            }
        }

        event.updated_at = Utc::now();
        if event.id.is_some() {
            self.store.update_event(event).await?;
            info!("Event updated");
        } else {
            self.store.create_event(event).await?;
            info!("Event created");
        }
        self.invalidate_cache();
        Ok(())
    }

    /// Runs the rulebook through the fallback pipeline and stores the
    /// resulting reference on the event.
    pub async fn attach_rulebook(
        &self,
        event_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadOutcome> {
        let mut event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("event {}", event_id)))?;

        // Replacing a previous rulebook cleans up its stored object first.
        if let Some(previous) = event.rulebook_pdf.take() {
            self.attachments.delete_rulebook(event_id, &previous).await?;
        }

        let outcome = self
            .attachments
            .store_rulebook(event_id, file_name, bytes)
            .await?;

        event.rulebook_pdf = Some(outcome.stored_value.clone());
        event.rulebook_name = Some(outcome.file_name.clone());
        event.updated_at = Utc::now();
        self.store.update_event(&event).await?;
        self.invalidate_cache();
        Ok(outcome)
    }

    /// Detaches the rulebook; deletion mirrors the upload representation.
    pub async fn remove_rulebook(&self, event_id: Uuid) -> Result<()> {
        let mut event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("event {}", event_id)))?;

        if let Some(stored) = event.rulebook_pdf.take() {
            self.attachments.delete_rulebook(event_id, &stored).await?;
        }
        event.rulebook_name = None;
        event.updated_at = Utc::now();
        self.store.update_event(&event).await?;
        self.invalidate_cache();
        Ok(())
    }

    /// Deletes an event, its attachment object, and all its registrations.
    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: Uuid) -> Result<usize> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("event {}", event_id)))?;

        // Attachment cleanup is best-effort and never blocks the cascade.
        if let Some(stored) = &event.rulebook_pdf {
            self.attachments.delete_rulebook(event_id, stored).await?;
        }

        let removed = self.store.delete_event_cascade(event_id).await?;
        self.invalidate_cache();
        info!("Event deleted with {} registrations", removed);
        Ok(removed)
    }

    /// Registers an academy, enforcing the abbreviation rules.
    pub async fn register_academy(&self, academy: &mut Academy) -> Result<()> {
        if academy.name.trim().is_empty() {
            return Err(ArenaError::Validation(
                "academy name is required".to_string(),
            ));
        }
        let abbreviation = academy.abbreviation.trim().to_uppercase();
        if abbreviation.is_empty() || abbreviation.len() > MAX_ABBREVIATION_LEN {
            return Err(ArenaError::Validation(format!(
                "abbreviation must be 1-{} characters",
                MAX_ABBREVIATION_LEN
            )));
        }
        if !is_valid_national_id(&academy.representative_national_id) {
            return Err(ArenaError::Validation(
                "representative national id must be exactly 8 digits".to_string(),
            ));
        }
        if self
            .store
            .academy_by_abbreviation(&abbreviation)
            .await?
            .is_some()
        {
            return Err(ArenaError::Validation(format!(
                "an academy with abbreviation {} already exists",
                abbreviation
            )));
        }

        academy.abbreviation = abbreviation;
        self.store.create_academy(academy).await?;
        self.invalidate_cache();
        info!("Academy registered: {}", academy.name);
        Ok(())
    }

    /// Submits a registration form and invalidates the cache on success.
    pub async fn submit_registration(
        &self,
        model: &mut RegistrationFormModel,
        today: NaiveDate,
    ) -> Result<()> {
        model.submit(self.store.as_ref(), &self.poomsae, today).await?;
        self.invalidate_cache();
        Ok(())
    }

    pub async fn events_with_counts(&self) -> Result<Vec<EventWithCounts>> {
        let snapshot = self.load_portal_data().await?;
        Ok(aggregation::join_event_participation(
            &snapshot.events,
            &snapshot.registrations,
        ))
    }

    pub async fn academies_with_counts(&self) -> Result<Vec<AcademyWithCounts>> {
        let snapshot = self.load_portal_data().await?;
        Ok(aggregation::join_academy_participation(
            &snapshot.academies,
            &snapshot.registrations,
        ))
    }

    pub async fn event_roster(&self, event_id: Uuid, today: NaiveDate) -> Result<EventRoster> {
        let snapshot = self.load_portal_data().await?;
        if !snapshot.events.iter().any(|e| e.id == Some(event_id)) {
            return Err(ArenaError::NotFound(format!("event {}", event_id)));
        }
        Ok(aggregation::build_event_roster(
            event_id,
            &snapshot.registrations,
            &snapshot.academies,
            &self.poomsae,
            today,
        ))
    }

    pub async fn overall_stats(&self, today: NaiveDate) -> Result<OverallStats> {
        let snapshot = self.load_portal_data().await?;
        Ok(aggregation::overall_stats(
            &snapshot.events,
            &snapshot.registrations,
            &snapshot.academies,
            today,
        ))
    }

    /// Public listing of events still open in the future; queried directly
    /// so the longer-lived public cache never hides a brand-new event.
    pub async fn upcoming_events(&self, today: NaiveDate) -> Result<Vec<Event>> {
        self.store.upcoming_events(today).await
    }
}

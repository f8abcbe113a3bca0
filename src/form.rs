//! Multi-athlete registration submission as a small state machine.
//!
//! One live, editable draft plus a list of already-converted read-only
//! entries. Converted entries are flat records addressed by a stable id,
//! so removal never suffers from re-indexing.

use crate::constants::{MAX_ATHLETES_PER_SUBMISSION, MAX_WEIGHT_KG, MIN_WEIGHT_KG};
use crate::categories;
use crate::domain::{is_valid_national_id, Athlete, AthleteModality, BeltRank, Registration, Sex};
use crate::error::{ArenaError, Result};
use crate::poomsae::PoomsaeTable;
use crate::store::DocumentStore;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Empty,
    Editing,
    Submitting,
    Committed,
    Failed,
}

/// The live entry being typed. All fields start unset; validation turns a
/// complete draft into a domain [`Athlete`].
#[derive(Debug, Clone, Default)]
pub struct AthleteDraft {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub belt: Option<BeltRank>,
    pub modality: Option<AthleteModality>,
    pub weight_kg: Option<f64>,
}

impl AthleteDraft {
    fn is_blank(&self) -> bool {
        self.first_name.is_empty()
            && self.last_name.is_empty()
            && self.national_id.is_empty()
            && self.birth_date.is_none()
            && self.sex.is_none()
            && self.belt.is_none()
            && self.modality.is_none()
            && self.weight_kg.is_none()
    }
}

/// A converted, read-only summary entry.
#[derive(Debug, Clone)]
pub struct ConvertedEntry {
    pub id: Uuid,
    pub athlete: Athlete,
    pub age: i32,
}

#[derive(Debug, Clone, Copy)]
struct EditTarget {
    registration_id: Uuid,
    athlete_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 1-based entry number as shown to the user.
    pub entry: usize,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Athlete {}: {}", self.entry, self.message)
    }
}

pub struct RegistrationFormModel {
    event_id: Uuid,
    academy_id: Uuid,
    state: FormState,
    entries: Vec<ConvertedEntry>,
    draft: AthleteDraft,
    edit_target: Option<EditTarget>,
    errors: Vec<ValidationIssue>,
}

impl RegistrationFormModel {
    pub fn new(event_id: Uuid, academy_id: Uuid) -> Self {
        Self {
            event_id,
            academy_id,
            state: FormState::Empty,
            entries: Vec::new(),
            draft: AthleteDraft::default(),
            edit_target: None,
            errors: Vec::new(),
        }
    }

    /// Pins the model to replacing one existing athlete in place. While the
    /// edit is active, converting additional entries is rejected.
    pub fn for_athlete_edit(
        event_id: Uuid,
        academy_id: Uuid,
        registration_id: Uuid,
        athlete_index: usize,
        current: &Athlete,
    ) -> Self {
        let mut model = Self::new(event_id, academy_id);
        model.edit_target = Some(EditTarget {
            registration_id,
            athlete_index,
        });
        model.draft = AthleteDraft {
            first_name: current.first_name.clone(),
            last_name: current.last_name.clone(),
            national_id: current.national_id.clone(),
            birth_date: Some(current.birth_date),
            sex: Some(current.sex),
            belt: Some(current.belt),
            modality: Some(current.modality),
            weight_kg: current.weight_kg,
        };
        model.state = FormState::Editing;
        model
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_editing_existing(&self) -> bool {
        self.edit_target.is_some()
    }

    pub fn entries(&self) -> &[ConvertedEntry] {
        &self.entries
    }

    /// Total athletes in the submission: converted entries plus the live one.
    pub fn entry_count(&self) -> usize {
        self.entries.len() + 1
    }

    pub fn validation_errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn draft_mut(&mut self) -> &mut AthleteDraft {
        if self.state == FormState::Empty {
            self.state = FormState::Editing;
        }
        &mut self.draft
    }

    /// Converts the live entry to a read-only summary and opens a fresh one.
    ///
    /// Conversion aborts without touching any entry when the live draft is
    /// incomplete for its modality, or when the submission already holds the
    /// maximum number of athletes.
    pub fn add_entry(&mut self, table: &PoomsaeTable, today: NaiveDate) -> Result<()> {
        if self.edit_target.is_some() {
            return Err(ArenaError::Validation(
                "Cannot add athletes while editing an existing one".to_string(),
            ));
        }
        // The live draft already occupies one slot.
        if self.entries.len() + 1 >= MAX_ATHLETES_PER_SUBMISSION {
            return Err(ArenaError::Validation(format!(
                "At most {} athletes per registration",
                MAX_ATHLETES_PER_SUBMISSION
            )));
        }

        let entry_no = self.entries.len() + 1;
        let athlete = match validate_draft(&self.draft, table, entry_no) {
            Ok(athlete) => athlete,
            Err(issues) => {
                self.errors = issues;
                return Err(ArenaError::Validation(
                    "Live entry is incomplete".to_string(),
                ));
            }
        };

        self.entries.push(ConvertedEntry {
            id: Uuid::new_v4(),
            age: categories::age_on(athlete.birth_date, today),
            athlete,
        });
        self.draft = AthleteDraft::default();
        self.errors.clear();
        self.state = FormState::Editing;
        Ok(())
    }

    /// Removes a converted entry by its stable id.
    pub fn remove_entry(&mut self, entry_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != entry_id);
        self.entries.len() < before
    }

    /// Validates every entry and persists the submission.
    ///
    /// In edit mode the pinned athlete is replaced in place; otherwise the
    /// athletes are appended to the academy's existing registration for the
    /// event, or a new registration is created when none exists yet.
    pub async fn submit(
        &mut self,
        store: &dyn DocumentStore,
        table: &PoomsaeTable,
        today: NaiveDate,
    ) -> Result<()> {
        let athletes = match self.validate_all(table) {
            Ok(athletes) => athletes,
            Err(issues) => {
                self.errors = issues;
                self.state = FormState::Editing;
                return Err(ArenaError::Validation(
                    "Registration has invalid entries".to_string(),
                ));
            }
        };

        self.state = FormState::Submitting;
        let result = match self.edit_target {
            Some(target) => self.replace_in_place(store, target, athletes).await,
            None => self.append_or_create(store, athletes, today).await,
        };

        match result {
            Ok(()) => {
                self.state = FormState::Committed;
                Ok(())
            }
            Err(e) => {
                // Keep everything the user typed so a retry needs no re-entry.
                warn!("Registration submit failed: {}", e);
                self.state = FormState::Failed;
                Err(e)
            }
        }
    }

    fn validate_all(&self, table: &PoomsaeTable) -> std::result::Result<Vec<Athlete>, Vec<ValidationIssue>> {
        let mut athletes = Vec::new();
        let mut issues = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            // Converted entries were validated at conversion time, but the
            // roster is re-checked as a whole before it leaves the model.
            if let Err(mut entry_issues) = check_athlete(&entry.athlete, table, i + 1) {
                issues.append(&mut entry_issues);
            }
            athletes.push(entry.athlete.clone());
        }

        let live_no = self.entries.len() + 1;
        if self.draft.is_blank() && !self.entries.is_empty() {
            // The live form was left untouched after the last conversion.
        } else {
            match validate_draft(&self.draft, table, live_no) {
                Ok(athlete) => athletes.push(athlete),
                Err(mut draft_issues) => issues.append(&mut draft_issues),
            }
        }

        if athletes.is_empty() && issues.is_empty() {
            issues.push(ValidationIssue {
                entry: 1,
                message: "at least one athlete is required".to_string(),
            });
        }
        if athletes.len() > MAX_ATHLETES_PER_SUBMISSION {
            issues.push(ValidationIssue {
                entry: athletes.len(),
                message: format!(
                    "at most {} athletes per registration",
                    MAX_ATHLETES_PER_SUBMISSION
                ),
            });
        }

        if issues.is_empty() {
            Ok(athletes)
        } else {
            Err(issues)
        }
    }

    async fn replace_in_place(
        &self,
        store: &dyn DocumentStore,
        target: EditTarget,
        mut athletes: Vec<Athlete>,
    ) -> Result<()> {
        // Edit mode carries exactly the live draft.
        let replacement = athletes
            .pop()
            .ok_or_else(|| ArenaError::Validation("nothing to submit".to_string()))?;

        let mut registration = store
            .get_registration(target.registration_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("registration {}", target.registration_id)))?;

        if target.athlete_index >= registration.athletes.len() {
            return Err(ArenaError::NotFound(format!(
                "athlete {} in registration {}",
                target.athlete_index, target.registration_id
            )));
        }
        registration.athletes[target.athlete_index] = replacement;
        registration.updated_at = Utc::now();
        store.update_registration(&registration).await?;

        info!(
            "Replaced athlete {} in registration {}",
            target.athlete_index, target.registration_id
        );
        Ok(())
    }

    async fn append_or_create(
        &self,
        store: &dyn DocumentStore,
        athletes: Vec<Athlete>,
        _today: NaiveDate,
    ) -> Result<()> {
        let existing = store
            .registrations_by_event(self.event_id)
            .await?
            .into_iter()
            .find(|r| r.academy_id == self.academy_id);

        match existing {
            Some(mut registration) => {
                // Invariant: one registration per (event, academy); appends
                // extend the roster instead of creating a second document.
                registration.athletes.extend(athletes);
                registration.updated_at = Utc::now();
                store.update_registration(&registration).await?;
                info!(
                    "Appended athletes to registration {:?} for event {}",
                    registration.id, self.event_id
                );
            }
            None => {
                let now = Utc::now();
                let mut registration = Registration {
                    id: None,
                    event_id: self.event_id,
                    academy_id: self.academy_id,
                    athletes,
                    created_at: now,
                    updated_at: now,
                };
                store.create_registration(&mut registration).await?;
                info!(
                    "Created registration {:?} for event {}",
                    registration.id, self.event_id
                );
            }
        }
        Ok(())
    }
}

fn validate_draft(
    draft: &AthleteDraft,
    table: &PoomsaeTable,
    entry_no: usize,
) -> std::result::Result<Athlete, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let issue = |message: &str| ValidationIssue {
        entry: entry_no,
        message: message.to_string(),
    };

    if draft.first_name.trim().is_empty() {
        issues.push(issue("first name is required"));
    }
    if draft.last_name.trim().is_empty() {
        issues.push(issue("last name is required"));
    }
    if !is_valid_national_id(&draft.national_id) {
        issues.push(issue("national id must be exactly 8 digits"));
    }
    if draft.birth_date.is_none() {
        issues.push(issue("birth date is required"));
    }
    if draft.sex.is_none() {
        issues.push(issue("sex is required"));
    }
    if draft.belt.is_none() {
        issues.push(issue("belt rank is required"));
    }

    let Some(modality) = draft.modality else {
        issues.push(issue("modality is required"));
        return Err(issues);
    };

    let mut poomsae_form = None;
    let mut weight_kg = None;
    match modality {
        AthleteModality::Kyorugi => match draft.weight_kg {
            Some(kg) if (MIN_WEIGHT_KG..=MAX_WEIGHT_KG).contains(&kg) => weight_kg = Some(kg),
            Some(_) => issues.push(issue(&format!(
                "weight must be between {}-{} kg",
                MIN_WEIGHT_KG, MAX_WEIGHT_KG
            ))),
            None => issues.push(issue("weight is required for Kyorugi")),
        },
        AthleteModality::Poomsae => {
            if let Some(belt) = draft.belt {
                match table.form_for(belt) {
                    Some(form) => poomsae_form = Some(form.to_string()),
                    None => issues.push(issue("no poomsae form is mapped for this belt rank")),
                }
            }
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    Ok(Athlete {
        first_name: draft.first_name.trim().to_string(),
        last_name: draft.last_name.trim().to_string(),
        national_id: draft.national_id.clone(),
        birth_date: draft.birth_date.unwrap(),
        sex: draft.sex.unwrap(),
        belt: draft.belt.unwrap(),
        modality,
        weight_kg,
        poomsae_form,
    })
}

/// Re-checks an already-converted athlete record.
fn check_athlete(
    athlete: &Athlete,
    table: &PoomsaeTable,
    entry_no: usize,
) -> std::result::Result<(), Vec<ValidationIssue>> {
    let draft = AthleteDraft {
        first_name: athlete.first_name.clone(),
        last_name: athlete.last_name.clone(),
        national_id: athlete.national_id.clone(),
        birth_date: Some(athlete.birth_date),
        sex: Some(athlete.sex),
        belt: Some(athlete.belt),
        modality: Some(athlete.modality),
        weight_kg: athlete.weight_kg,
    };
    validate_draft(&draft, table, entry_no).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 8).unwrap()
    }

    fn fill_kyorugi(draft: &mut AthleteDraft, id: &str) {
        draft.first_name = "Pedro".into();
        draft.last_name = "Gomez".into();
        draft.national_id = id.into();
        draft.birth_date = Some(NaiveDate::from_ymd_opt(2009, 4, 4).unwrap());
        draft.sex = Some(Sex::Male);
        draft.belt = Some(BeltRank::Kup(7));
        draft.modality = Some(AthleteModality::Kyorugi);
        draft.weight_kg = Some(52.0);
    }

    #[test]
    fn tenth_entry_is_accepted_eleventh_rejected() {
        let table = PoomsaeTable::default();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());

        // Nine conversions leave nine summaries plus the live draft: ten total.
        for i in 0..9 {
            fill_kyorugi(model.draft_mut(), &format!("1000000{}", i));
            model.add_entry(&table, today()).unwrap();
        }
        assert_eq!(model.entry_count(), 10);

        fill_kyorugi(model.draft_mut(), "19999999");
        let err = model.add_entry(&table, today()).unwrap_err();
        assert!(matches!(err, ArenaError::Validation(_)));
        assert_eq!(model.entry_count(), 10);
    }

    #[test]
    fn incomplete_draft_aborts_conversion_without_side_effects() {
        let table = PoomsaeTable::default();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());

        let draft = model.draft_mut();
        draft.first_name = "Solo".into();
        assert!(model.add_entry(&table, today()).is_err());
        assert!(model.entries().is_empty());
        assert!(!model.validation_errors().is_empty());
        assert_eq!(model.state(), FormState::Editing);
    }

    #[test]
    fn national_id_must_be_eight_digits() {
        let table = PoomsaeTable::default();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());
        fill_kyorugi(model.draft_mut(), "1234567");
        assert!(model.add_entry(&table, today()).is_err());
        assert!(model
            .validation_errors()
            .iter()
            .any(|i| i.message.contains("8 digits")));
    }

    #[test]
    fn poomsae_draft_without_mapped_form_fails() {
        let sparse: PoomsaeTable =
            toml::from_str("[forms]\n\"KUP-8\" = \"Taegeuk 1 Jang\"\n").unwrap();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());

        let draft = model.draft_mut();
        fill_kyorugi(draft, "12345678");
        draft.modality = Some(AthleteModality::Poomsae);
        draft.weight_kg = None;
        draft.belt = Some(BeltRank::Kup(5));

        assert!(model.add_entry(&sparse, today()).is_err());
        assert!(model
            .validation_errors()
            .iter()
            .any(|i| i.message.contains("poomsae form")));
    }

    #[test]
    fn remove_entry_by_stable_identity() {
        let table = PoomsaeTable::default();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());
        fill_kyorugi(model.draft_mut(), "11111111");
        model.add_entry(&table, today()).unwrap();
        fill_kyorugi(model.draft_mut(), "22222222");
        model.add_entry(&table, today()).unwrap();

        let first_id = model.entries()[0].id;
        assert!(model.remove_entry(first_id));
        assert!(!model.remove_entry(first_id));
        assert_eq!(model.entries().len(), 1);
        assert_eq!(model.entries()[0].athlete.national_id, "22222222");
    }

    #[tokio::test]
    async fn second_submission_appends_to_existing_registration() {
        let store = InMemoryStore::new();
        let table = PoomsaeTable::default();
        let event_id = Uuid::new_v4();
        let academy_id = Uuid::new_v4();

        let mut first = RegistrationFormModel::new(event_id, academy_id);
        fill_kyorugi(first.draft_mut(), "11111111");
        first.submit(&store, &table, today()).await.unwrap();
        assert_eq!(first.state(), FormState::Committed);

        let mut second = RegistrationFormModel::new(event_id, academy_id);
        fill_kyorugi(second.draft_mut(), "22222222");
        second.submit(&store, &table, today()).await.unwrap();

        let registrations = store.registrations_by_event(event_id).await.unwrap();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].athletes.len(), 2);
    }

    #[tokio::test]
    async fn edit_mode_replaces_single_athlete_in_place() {
        let store = InMemoryStore::new();
        let table = PoomsaeTable::default();
        let event_id = Uuid::new_v4();
        let academy_id = Uuid::new_v4();

        let mut submit_model = RegistrationFormModel::new(event_id, academy_id);
        fill_kyorugi(submit_model.draft_mut(), "11111111");
        submit_model.add_entry(&table, today()).unwrap();
        fill_kyorugi(submit_model.draft_mut(), "22222222");
        submit_model.submit(&store, &table, today()).await.unwrap();

        let registration = store
            .registrations_by_event(event_id)
            .await
            .unwrap()
            .remove(0);
        let registration_id = registration.id.unwrap();

        let mut edit = RegistrationFormModel::for_athlete_edit(
            event_id,
            academy_id,
            registration_id,
            0,
            &registration.athletes[0],
        );
        assert!(edit.is_editing_existing());
        // The add-more affordance is disabled during an edit.
        assert!(edit.add_entry(&table, today()).is_err());

        edit.draft_mut().weight_kg = Some(63.5);
        edit.submit(&store, &table, today()).await.unwrap();

        let updated = store.get_registration(registration_id).await.unwrap().unwrap();
        assert_eq!(updated.athletes.len(), 2);
        assert_eq!(updated.athletes[0].weight_kg, Some(63.5));
        assert_eq!(updated.athletes[1].national_id, "22222222");
    }

    struct UnreachableStore;

    #[async_trait]
    impl DocumentStore for UnreachableStore {
        async fn create_event(&self, _: &mut crate::domain::Event) -> Result<()> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn get_event(&self, _: Uuid) -> Result<Option<crate::domain::Event>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn update_event(&self, _: &crate::domain::Event) -> Result<()> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn list_events(&self) -> Result<Vec<crate::domain::Event>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn upcoming_events(&self, _: NaiveDate) -> Result<Vec<crate::domain::Event>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn delete_event_cascade(&self, _: Uuid) -> Result<usize> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn create_registration(&self, _: &mut Registration) -> Result<()> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn get_registration(&self, _: Uuid) -> Result<Option<Registration>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn update_registration(&self, _: &Registration) -> Result<()> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn list_registrations(&self) -> Result<Vec<Registration>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn registrations_by_event(&self, _: Uuid) -> Result<Vec<Registration>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn registrations_by_academy(&self, _: Uuid) -> Result<Vec<Registration>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn create_academy(&self, _: &mut crate::domain::Academy) -> Result<()> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn get_academy(&self, _: Uuid) -> Result<Option<crate::domain::Academy>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn list_academies(&self) -> Result<Vec<crate::domain::Academy>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
        async fn academy_by_abbreviation(&self, _: &str) -> Result<Option<crate::domain::Academy>> {
            Err(ArenaError::NetworkUnavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn remote_failure_preserves_entered_data() {
        let table = PoomsaeTable::default();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());
        fill_kyorugi(model.draft_mut(), "11111111");
        model.add_entry(&table, today()).unwrap();
        fill_kyorugi(model.draft_mut(), "22222222");

        let err = model.submit(&UnreachableStore, &table, today()).await.unwrap_err();
        assert!(matches!(err, ArenaError::NetworkUnavailable(_)));
        assert_eq!(model.state(), FormState::Failed);
        // All entered data survives for a retry.
        assert_eq!(model.entries().len(), 1);
        assert_eq!(model.entries()[0].athlete.national_id, "11111111");

        // Retry against a working store succeeds with the same data.
        let store = InMemoryStore::new();
        model.submit(&store, &table, today()).await.unwrap();
        assert_eq!(model.state(), FormState::Committed);
        let registrations = store.list_registrations().await.unwrap();
        assert_eq!(registrations[0].athletes.len(), 2);
    }

    #[tokio::test]
    async fn blank_model_cannot_submit() {
        let store = InMemoryStore::new();
        let table = PoomsaeTable::default();
        let mut model = RegistrationFormModel::new(Uuid::new_v4(), Uuid::new_v4());
        let err = model.submit(&store, &table, today()).await.unwrap_err();
        assert!(matches!(err, ArenaError::Validation(_)));
        assert_eq!(model.state(), FormState::Editing);
    }
}

//! Pure joins over cache snapshots. No side effects; callers pass in the
//! collections and get derived views back.

use crate::categories::{self, AthleteCategory};
use crate::domain::{Academy, Athlete, AthleteModality, Event, Registration};
use crate::poomsae::PoomsaeTable;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct EventWithCounts {
    pub event: Event,
    pub total_athletes: usize,
    /// Distinct academies, not registration count: one academy holds exactly
    /// one registration per event regardless of roster size.
    pub total_academies: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcademyWithCounts {
    pub academy: Academy,
    pub events_participated: usize,
    pub total_athletes_enrolled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallStats {
    pub total_academies: usize,
    pub total_events: usize,
    pub upcoming_events: usize,
    pub total_athletes: usize,
}

/// One athlete row in an event roster, joined with its academy and the
/// derived category, addressable by stable registration identity.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub registration_id: Uuid,
    pub athlete_index: usize,
    pub academy_name: String,
    pub academy_abbreviation: String,
    pub athlete: Athlete,
    pub category: AthleteCategory,
}

/// Event roster partitioned by modality for the two summary tables.
#[derive(Debug, Clone, Serialize, Default)]
pub struct EventRoster {
    pub kyorugi: Vec<RosterEntry>,
    pub poomsae: Vec<RosterEntry>,
}

fn index_by<'a, K, F>(registrations: &'a [Registration], key: F) -> HashMap<K, Vec<&'a Registration>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&Registration) -> K,
{
    let mut index: HashMap<K, Vec<&Registration>> = HashMap::new();
    for registration in registrations {
        index.entry(key(registration)).or_default().push(registration);
    }
    index
}

pub fn join_event_participation(
    events: &[Event],
    registrations: &[Registration],
) -> Vec<EventWithCounts> {
    let by_event = index_by(registrations, |r| r.event_id);

    events
        .iter()
        .map(|event| {
            let matching = event
                .id
                .and_then(|id| by_event.get(&id))
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let total_athletes = matching.iter().map(|r| r.athletes.len()).sum();
            let total_academies = matching
                .iter()
                .map(|r| r.academy_id)
                .collect::<HashSet<_>>()
                .len();

            EventWithCounts {
                event: event.clone(),
                total_athletes,
                total_academies,
            }
        })
        .collect()
}

pub fn join_academy_participation(
    academies: &[Academy],
    registrations: &[Registration],
) -> Vec<AcademyWithCounts> {
    let by_academy = index_by(registrations, |r| r.academy_id);

    academies
        .iter()
        .map(|academy| {
            let matching = academy
                .id
                .and_then(|id| by_academy.get(&id))
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            AcademyWithCounts {
                academy: academy.clone(),
                events_participated: matching.len(),
                total_athletes_enrolled: matching.iter().map(|r| r.athletes.len()).sum(),
            }
        })
        .collect()
}

pub fn overall_stats(
    events: &[Event],
    registrations: &[Registration],
    academies: &[Academy],
    today: NaiveDate,
) -> OverallStats {
    OverallStats {
        total_academies: academies.len(),
        total_events: events.len(),
        upcoming_events: events.iter().filter(|e| e.date > today).count(),
        total_athletes: registrations.iter().map(|r| r.athletes.len()).sum(),
    }
}

/// Builds the categorized, modality-split roster for one event.
pub fn build_event_roster(
    event_id: Uuid,
    registrations: &[Registration],
    academies: &[Academy],
    table: &PoomsaeTable,
    today: NaiveDate,
) -> EventRoster {
    let academy_names: HashMap<Uuid, &Academy> = academies
        .iter()
        .filter_map(|a| a.id.map(|id| (id, a)))
        .collect();

    let mut roster = EventRoster::default();
    for registration in registrations.iter().filter(|r| r.event_id == event_id) {
        let Some(registration_id) = registration.id else {
            continue;
        };
        let (academy_name, academy_abbreviation) = academy_names
            .get(&registration.academy_id)
            .map(|a| (a.name.clone(), a.abbreviation.clone()))
            .unwrap_or_else(|| ("Unknown academy".to_string(), String::new()));

        for (athlete_index, athlete) in registration.athletes.iter().enumerate() {
            let entry = RosterEntry {
                registration_id,
                athlete_index,
                academy_name: academy_name.clone(),
                academy_abbreviation: academy_abbreviation.clone(),
                athlete: athlete.clone(),
                category: categories::categorize(athlete, table, today),
            };
            match athlete.modality {
                AthleteModality::Kyorugi => roster.kyorugi.push(entry),
                AthleteModality::Poomsae => roster.poomsae.push(entry),
            }
        }
    }
    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BeltRank, EventModality, Sex};
    use chrono::Utc;

    fn event(id: Uuid, date: NaiveDate) -> Event {
        Event {
            id: Some(id),
            name: "Open".into(),
            date,
            registration_deadline: None,
            country: "Peru".into(),
            city: "Lima".into(),
            venue: "Coliseo".into(),
            modality: EventModality::Both,
            description: "".into(),
            image: None,
            rulebook_pdf: None,
            rulebook_name: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn athlete(modality: AthleteModality) -> Athlete {
        Athlete {
            first_name: "Jose".into(),
            last_name: "Lopez".into(),
            national_id: "12312312".into(),
            birth_date: NaiveDate::from_ymd_opt(2011, 2, 2).unwrap(),
            sex: Sex::Male,
            belt: BeltRank::Kup(9),
            modality,
            weight_kg: matches!(modality, AthleteModality::Kyorugi).then_some(40.0),
            poomsae_form: None,
        }
    }

    fn registration(event_id: Uuid, academy_id: Uuid, athletes: Vec<Athlete>) -> Registration {
        Registration {
            id: Some(Uuid::new_v4()),
            event_id,
            academy_id,
            athletes,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn academy(id: Uuid, name: &str, abbreviation: &str) -> Academy {
        Academy {
            id: Some(id),
            name: name.into(),
            abbreviation: abbreviation.into(),
            representative: "Rep".into(),
            representative_national_id: "55667788".into(),
            phone: None,
            email: "rep@academy.pe".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn academies_are_counted_distinct_not_per_registration() {
        let event_id = Uuid::new_v4();
        let academy_id = Uuid::new_v4();
        let events = vec![event(event_id, NaiveDate::from_ymd_opt(2026, 9, 9).unwrap())];
        // One academy, one registration, many athletes.
        let registrations = vec![registration(
            event_id,
            academy_id,
            vec![
                athlete(AthleteModality::Kyorugi),
                athlete(AthleteModality::Kyorugi),
                athlete(AthleteModality::Poomsae),
            ],
        )];

        let counts = join_event_participation(&events, &registrations);
        assert_eq!(counts[0].total_athletes, 3);
        assert_eq!(counts[0].total_academies, 1);
    }

    #[test]
    fn academy_participation_sums_across_events() {
        let academy_id = Uuid::new_v4();
        let academies = vec![academy(academy_id, "Tigres", "TIG")];
        let registrations = vec![
            registration(Uuid::new_v4(), academy_id, vec![athlete(AthleteModality::Kyorugi)]),
            registration(
                Uuid::new_v4(),
                academy_id,
                vec![
                    athlete(AthleteModality::Kyorugi),
                    athlete(AthleteModality::Poomsae),
                ],
            ),
        ];

        let counts = join_academy_participation(&academies, &registrations);
        assert_eq!(counts[0].events_participated, 2);
        assert_eq!(counts[0].total_athletes_enrolled, 3);
    }

    #[test]
    fn roster_splits_by_modality_with_stable_identity() {
        let event_id = Uuid::new_v4();
        let academy_id = Uuid::new_v4();
        let academies = vec![academy(academy_id, "Tigres", "TIG")];
        let registrations = vec![registration(
            event_id,
            academy_id,
            vec![
                athlete(AthleteModality::Kyorugi),
                athlete(AthleteModality::Poomsae),
            ],
        )];

        let today = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        let roster = build_event_roster(
            event_id,
            &registrations,
            &academies,
            &PoomsaeTable::default(),
            today,
        );

        assert_eq!(roster.kyorugi.len(), 1);
        assert_eq!(roster.poomsae.len(), 1);
        assert_eq!(roster.kyorugi[0].athlete_index, 0);
        assert_eq!(roster.poomsae[0].athlete_index, 1);
        assert_eq!(roster.poomsae[0].academy_abbreviation, "TIG");
        assert_eq!(
            roster.poomsae[0].category.poomsae_form.as_deref(),
            Some("Kibon Poomsae")
        );
    }

    #[test]
    fn overall_stats_counts_upcoming_only_after_today() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        let events = vec![
            event(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()),
            event(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()),
        ];
        let stats = overall_stats(&events, &[], &[], today);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.upcoming_events, 1);
    }
}

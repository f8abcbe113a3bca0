//! Pure categorization of athletes into competition categories.
//!
//! Everything here is deterministic over its inputs; the current date is
//! always passed in by the caller so age boundaries are testable.

use crate::domain::{Athlete, AthleteModality, BeltRank, Sex};
use crate::poomsae::PoomsaeTable;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Age divisions, inclusive at the upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgeDivision {
    PreCadetesA,
    PreCadetesB,
    PreCadetesC,
    Cadetes,
    Prejuvenil,
    JuvenilU22,
    Senior,
}

impl fmt::Display for AgeDivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgeDivision::PreCadetesA => "PRE CADETES A",
            AgeDivision::PreCadetesB => "PRE CADETES B",
            AgeDivision::PreCadetesC => "PRE CADETES C",
            AgeDivision::Cadetes => "CADETES",
            AgeDivision::Prejuvenil => "PREJUVENIL",
            AgeDivision::JuvenilU22 => "JUVENIL U22",
            AgeDivision::Senior => "SENIOR",
        };
        write!(f, "{}", label)
    }
}

pub fn age_division(age: i32) -> AgeDivision {
    if age <= 9 {
        AgeDivision::PreCadetesA
    } else if age <= 11 {
        AgeDivision::PreCadetesB
    } else if age <= 13 {
        AgeDivision::PreCadetesC
    } else if age <= 15 {
        AgeDivision::Cadetes
    } else if age <= 17 {
        AgeDivision::Prejuvenil
    } else if age <= 22 {
        AgeDivision::JuvenilU22
    } else {
        AgeDivision::Senior
    }
}

/// Skill tier derived from belt rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BeltLevel {
    Novice,
    Intermediate,
    Advanced,
}

impl fmt::Display for BeltLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BeltLevel::Novice => "Novice",
            BeltLevel::Intermediate => "Intermediate",
            BeltLevel::Advanced => "Advanced",
        };
        write!(f, "{}", label)
    }
}

pub fn belt_level(rank: BeltRank) -> BeltLevel {
    match rank {
        BeltRank::Kup(n) if n >= 8 => BeltLevel::Novice,
        BeltRank::Kup(n) if n >= 4 => BeltLevel::Intermediate,
        _ => BeltLevel::Advanced,
    }
}

/// Official Kyorugi weight class, sex-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightClass(pub &'static str);

impl fmt::Display for WeightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const MALE_LADDER: &[(f64, &str)] = &[
    (54.0, "-54kg"),
    (58.0, "-58kg"),
    (63.0, "-63kg"),
    (68.0, "-68kg"),
    (74.0, "-74kg"),
    (80.0, "-80kg"),
    (87.0, "-87kg"),
];
const MALE_UNBOUNDED: &str = "+87kg";

const FEMALE_LADDER: &[(f64, &str)] = &[
    (46.0, "-46kg"),
    (49.0, "-49kg"),
    (53.0, "-53kg"),
    (57.0, "-57kg"),
    (62.0, "-62kg"),
    (67.0, "-67kg"),
    (73.0, "-73kg"),
];
const FEMALE_UNBOUNDED: &str = "+73kg";

pub fn weight_class(sex: Sex, weight_kg: f64) -> WeightClass {
    let (ladder, unbounded) = match sex {
        Sex::Male => (MALE_LADDER, MALE_UNBOUNDED),
        Sex::Female => (FEMALE_LADDER, FEMALE_UNBOUNDED),
    };
    for (bound, label) in ladder {
        if weight_kg <= *bound {
            return WeightClass(label);
        }
    }
    WeightClass(unbounded)
}

/// Coarse 5 kg roster band used in summary views. Not an official bracket;
/// must never stand in for [`weight_class`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryBand {
    pub name: &'static str,
    /// Upper bound in kg, `None` for the open-ended top band.
    pub cap_kg: Option<u32>,
}

impl fmt::Display for SummaryBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cap_kg {
            Some(cap) => write!(f, "{} ({}kg)", self.name, cap),
            None => write!(f, "{} (+70kg)", self.name),
        }
    }
}

const SUMMARY_LADDER: &[(f64, &str)] = &[
    (30.0, "LIGHT"),
    (35.0, "MIDDLE"),
    (40.0, "HEAVY"),
    (45.0, "BANTAM"),
    (50.0, "WELTER"),
    (55.0, "LIGHT"),
    (60.0, "MIDDLE"),
    (65.0, "HEAVY"),
    (70.0, "FEATHER"),
];

pub fn summary_band(weight_kg: f64) -> SummaryBand {
    for (bound, name) in SUMMARY_LADDER {
        if weight_kg <= *bound {
            return SummaryBand {
                name,
                cap_kg: Some(*bound as u32),
            };
        }
    }
    SummaryBand {
        name: "SUPER HEAVY",
        cap_kg: None,
    }
}

/// Calendar age on a given date, correcting for the birthday not yet
/// reached in the current year.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// The full derived category for one athlete. Computed on demand from the
/// raw attributes; never persisted or cached independently of them.
#[derive(Debug, Clone, Serialize)]
pub struct AthleteCategory {
    pub age: i32,
    pub age_division: AgeDivision,
    pub belt_level: BeltLevel,
    pub weight_class: Option<WeightClass>,
    pub summary_band: Option<SummaryBand>,
    pub poomsae_form: Option<String>,
}

pub fn categorize(athlete: &Athlete, table: &PoomsaeTable, today: NaiveDate) -> AthleteCategory {
    let age = age_on(athlete.birth_date, today);
    let (weight_class, summary_band) = match (athlete.modality, athlete.weight_kg) {
        (AthleteModality::Kyorugi, Some(kg)) => {
            (Some(weight_class(athlete.sex, kg)), Some(summary_band(kg)))
        }
        _ => (None, None),
    };
    let poomsae_form = match athlete.modality {
        AthleteModality::Poomsae => table.form_for(athlete.belt).map(str::to_owned),
        AthleteModality::Kyorugi => None,
    };

    AthleteCategory {
        age,
        age_division: age_division(age),
        belt_level: belt_level(athlete.belt),
        weight_class,
        summary_band,
        poomsae_form,
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static NATIONAL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8}$").unwrap());

/// National identity documents are exactly 8 digits.
pub fn is_valid_national_id(id: &str) -> bool {
    NATIONAL_ID_RE.is_match(id)
}

/// Competition modalities an event can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventModality {
    Kyorugi,
    Poomsae,
    Both,
}

impl EventModality {
    pub fn allows(&self, athlete_modality: AthleteModality) -> bool {
        match self {
            EventModality::Both => true,
            EventModality::Kyorugi => athlete_modality == AthleteModality::Kyorugi,
            EventModality::Poomsae => athlete_modality == AthleteModality::Poomsae,
        }
    }
}

/// The single modality one athlete competes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AthleteModality {
    Kyorugi,
    Poomsae,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

/// Belt rank: KUP grades count down toward black belt, DAN grades count up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BeltRank {
    Kup(u8),
    Dan(u8),
}

impl BeltRank {
    /// Canonical code string, e.g. `KUP-4` or `DAN-1`.
    pub fn code(&self) -> String {
        match self {
            BeltRank::Kup(n) => format!("KUP-{}", n),
            BeltRank::Dan(n) => format!("DAN-{}", n),
        }
    }

    /// Human-readable label, e.g. `4th KUP` or `1st DAN - Black Belt`.
    pub fn label(&self) -> String {
        match self {
            BeltRank::Kup(n) => format!("{} KUP", ordinal(*n)),
            BeltRank::Dan(n) => format!("{} DAN - Black Belt", ordinal(*n)),
        }
    }

    /// Reverse of [`BeltRank::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        let n: u8 = digits.parse().ok()?;
        if label.contains("KUP") {
            Some(BeltRank::Kup(n)).filter(|r| r.is_valid())
        } else if label.contains("DAN") {
            Some(BeltRank::Dan(n)).filter(|r| r.is_valid())
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            BeltRank::Kup(n) => (1..=10).contains(n),
            BeltRank::Dan(n) => (1..=9).contains(n),
        }
    }
}

fn ordinal(n: u8) -> String {
    let suffix = match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

impl fmt::Display for BeltRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for BeltRank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, number) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid belt rank code: {}", s))?;
        let n: u8 = number
            .parse()
            .map_err(|_| format!("invalid belt rank number: {}", s))?;
        let rank = match kind {
            "KUP" => BeltRank::Kup(n),
            "DAN" => BeltRank::Dan(n),
            _ => return Err(format!("invalid belt rank code: {}", s)),
        };
        if !rank.is_valid() {
            return Err(format!("belt rank out of range: {}", s));
        }
        Ok(rank)
    }
}

impl TryFrom<String> for BeltRank {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BeltRank> for String {
    fn from(rank: BeltRank) -> Self {
        rank.code()
    }
}

/// An event in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<Uuid>,
    pub name: String,
    pub date: NaiveDate,
    pub registration_deadline: Option<NaiveDate>,
    pub country: String,
    pub city: String,
    pub venue: String,
    pub modality: EventModality,
    pub description: String,
    /// Inline data URI, set when the organizer attached a promo image.
    pub image: Option<String>,
    /// Stored rulebook value: a storage URL, an inline data URI, or an
    /// oversized-marker JSON blob. See the attachments module.
    pub rulebook_pdf: Option<String>,
    pub rulebook_name: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A delegation (academy) that enrolls athletes into events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Academy {
    pub id: Option<Uuid>,
    pub name: String,
    /// Uppercased, unique among academies, at most 10 characters.
    pub abbreviation: String,
    pub representative: String,
    pub representative_national_id: String,
    pub phone: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The single registration an academy holds for one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Option<Uuid>,
    pub event_id: Uuid,
    pub academy_id: Uuid,
    pub athletes: Vec<Athlete>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One athlete entry embedded in a registration roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Athlete {
    pub first_name: String,
    pub last_name: String,
    /// National identity document, exactly 8 digits.
    pub national_id: String,
    pub birth_date: NaiveDate,
    pub sex: Sex,
    pub belt: BeltRank,
    pub modality: AthleteModality,
    /// Present only when modality is Kyorugi.
    pub weight_kg: Option<f64>,
    /// Present only when modality is Poomsae; derived from the belt rank.
    pub poomsae_form: Option<String>,
}

impl Athlete {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

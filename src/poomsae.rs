use crate::domain::BeltRank;
use crate::error::{ArenaError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use tracing::warn;

/// Rank-to-form lookup for Poomsae competition, loaded from external
/// configuration so federations can swap routines without a rebuild.
#[derive(Debug, Clone, Deserialize)]
pub struct PoomsaeTable {
    forms: HashMap<String, String>,
}

/// Built-in WT form assignment used when no table file is configured.
const DEFAULT_TABLE: &str = r#"
[forms]
"KUP-9" = "Kibon Poomsae"
"KUP-8" = "Taegeuk 1 Jang"
"KUP-7" = "Taegeuk 2 Jang"
"KUP-6" = "Taegeuk 3 Jang"
"KUP-5" = "Taegeuk 4 Jang"
"KUP-4" = "Taegeuk 5 Jang"
"KUP-3" = "Taegeuk 6 Jang"
"KUP-2" = "Taegeuk 7 Jang"
"KUP-1" = "Taegeuk 8 Jang"
"DAN-1" = "Koryo"
"DAN-2" = "Keumgang"
"DAN-3" = "Taebaek"
"DAN-4" = "Pyongwon"
"DAN-5" = "Sipjin"
"DAN-6" = "Jitae"
"DAN-7" = "Chonkwon"
"DAN-8" = "Hansu"
"#;

static BUILT_IN: Lazy<PoomsaeTable> =
    Lazy::new(|| toml::from_str(DEFAULT_TABLE).expect("built-in poomsae table is well-formed"));

impl PoomsaeTable {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ArenaError::Config(format!("Failed to read poomsae table '{}': {}", path, e))
        })?;
        let table: PoomsaeTable = toml::from_str(&content)?;
        Ok(table)
    }

    /// Loads the configured table, falling back to the built-in assignment.
    pub fn load_or_default(path: Option<&str>) -> Self {
        match path {
            Some(p) => match Self::load(p) {
                Ok(table) => table,
                Err(e) => {
                    warn!("Falling back to built-in poomsae table: {}", e);
                    BUILT_IN.clone()
                }
            },
            None => BUILT_IN.clone(),
        }
    }

    /// Resolves the competition form for a belt rank.
    ///
    /// KUP-10 shares the beginner form with KUP-9, and DAN-9 performs the
    /// same form as DAN-8. Ranks missing from the table resolve to `None`,
    /// which form validation treats as a failure for Poomsae athletes.
    pub fn form_for(&self, rank: BeltRank) -> Option<&str> {
        let canonical = match rank {
            BeltRank::Kup(10) => BeltRank::Kup(9),
            BeltRank::Dan(9) => BeltRank::Dan(8),
            other => other,
        };
        self.forms.get(&canonical.code()).map(String::as_str)
    }
}

impl Default for PoomsaeTable {
    fn default() -> Self {
        BUILT_IN.clone()
    }
}

/// Shared limits and collection names used across the portal core.

// Document-database collection names
pub const EVENTS_COLLECTION: &str = "events";
pub const REGISTRATIONS_COLLECTION: &str = "registrations";
pub const ACADEMIES_COLLECTION: &str = "academies";

// Cache staleness tolerance per deployment context
pub const ADMIN_CACHE_TTL_SECS: u64 = 60;
pub const PUBLIC_CACHE_TTL_SECS: u64 = 300;

// Registration form limits
pub const MAX_ATHLETES_PER_SUBMISSION: usize = 10;
pub const MIN_WEIGHT_KG: f64 = 20.0;
pub const MAX_WEIGHT_KG: f64 = 200.0;
pub const MAX_ABBREVIATION_LEN: usize = 10;

// Attachment pipeline ceilings
pub const UPLOAD_TIMEOUT_SECS: u64 = 10;
pub const INLINE_CEILING_BYTES: usize = 800 * 1024;
pub const CHUNK_SIZE_BYTES: usize = 500 * 1024;
pub const SAFE_CEILING_BYTES: usize = 700 * 1024;

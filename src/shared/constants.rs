/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

pub const BYTES_PER_MEGABYTE: i64 = 1024 * 1024;

// =============================================================================
// ACCOUNT ANONYMIZATION
// =============================================================================

/// Tag prepended to the address of a soft-deleted account
pub const ANONYMIZED_EMAIL_TAG: &str = "deleted_";

/// Domain suffix appended to the address of a soft-deleted account
pub const ANONYMIZED_EMAIL_DOMAIN: &str = "@deleted.invalid";

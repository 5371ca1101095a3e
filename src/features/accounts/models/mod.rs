mod account;
mod cleanup;

pub use account::{anonymize_email, Account, AccountKind};
pub use cleanup::CleanupStep;

mod audit_entry;

pub use audit_entry::{AuditAction, AuditEntry, AuditFilter, EntityType, NewAuditEntry};

//! Shared primitive types used across the engine.

/// Stable identifier of a jurisdiction rule row.
pub type RuleId = String;

/// Statutory or dealer fee code, e.g. `TITLE_TRANSFER`.
pub type FeeCode = String;

/// Two-letter state code as supplied by the caller.
pub type StateCode = String;

/// Identifier of a dealer configuration.
pub type DealerId = String;

/// Identifier of a recorded calculation in the audit log.
pub type AuditId = String;

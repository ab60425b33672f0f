//! # Error Types
//!
//! Domain-specific error types for recall-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  recall-core errors (this file)                                        │
//! │  └── CoreError        - Domain rule violations                         │
//! │                                                                         │
//! │  recall-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  recall-sync errors (separate crate)                                   │
//! │  └── SyncError        - Transport/protocol/ownership failures          │
//! │                                                                         │
//! │  Flow: CoreError → DbError → SyncError → HTTP status                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (grade, ID, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// These errors represent rule violations caught at the boundary before
/// data reaches the scheduler. The scheduler itself is total and never
/// fails for valid typed inputs.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Grade outside {again, hard, good, easy}.
    ///
    /// ## When This Occurs
    /// - Wire data or UI input carries an unknown grade string
    ///
    /// Rejected before reaching the scheduler; never silently clamped.
    #[error("Invalid grade: '{0}' (expected one of: again, hard, good, easy)")]
    InvalidGrade(String),

    /// Ease factor below the SM-2 minimum of 1.3.
    ///
    /// ## When This Occurs
    /// - Inbound sync data carries a corrupted or hand-edited row
    #[error("Invalid ease factor {0}: must be >= 1.3")]
    InvalidEaseFactor(f64),

    /// Negative interval.
    #[error("Invalid interval {0}: must be >= 0 days")]
    InvalidInterval(i64),

    /// A required identifier is missing or empty.
    #[error("{field} is required")]
    MissingField { field: String },
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Validates the scheduling invariants of inbound data.
///
/// ## When To Call
/// On rows arriving from outside the scheduler (sync pull, imports).
/// Rows produced by [`crate::scheduler::apply_grade`] satisfy these by
/// construction.
pub fn validate_scheduling(ease_factor: f64, interval_days: i64) -> Result<(), CoreError> {
    if ease_factor < crate::types::MIN_EASE_FACTOR {
        return Err(CoreError::InvalidEaseFactor(ease_factor));
    }
    if interval_days < 0 {
        return Err(CoreError::InvalidInterval(interval_days));
    }
    Ok(())
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidGrade("perfect".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid grade: 'perfect' (expected one of: again, hard, good, easy)"
        );

        let err = CoreError::InvalidEaseFactor(1.1);
        assert!(err.to_string().contains("1.1"));
    }

    #[test]
    fn test_validate_scheduling() {
        assert!(validate_scheduling(2.5, 0).is_ok());
        assert!(validate_scheduling(1.3, 100).is_ok());
        assert!(validate_scheduling(1.2, 1).is_err());
        assert!(validate_scheduling(2.5, -1).is_err());
    }
}

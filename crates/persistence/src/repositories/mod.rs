//! Repository implementations for database operations.
//!
//! Methods that change more than one row run inside a single transaction and
//! lock the rows they read with `FOR UPDATE`.

pub mod assignment;
pub mod distribution_log;
pub mod enrollment;
pub mod gift_card;
pub mod participant;
pub mod survey_link;
pub mod unsent_audit;

pub use assignment::AssignmentRepository;
pub use distribution_log::DistributionLogRepository;
pub use enrollment::EnrollmentRepository;
pub use gift_card::GiftCardRepository;
pub use participant::ParticipantRepository;
pub use survey_link::SurveyLinkRepository;
pub use unsent_audit::UnsentAuditRepository;

/// `ILIKE` pattern for a lowercased search term, with wildcards escaped.
pub(crate) fn search_pattern(term: Option<String>) -> Option<String> {
    term.map(|t| {
        let escaped = t
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(Some("wave_1".into())).as_deref(), Some("%wave\\_1%"));
        assert_eq!(search_pattern(Some("50%".into())).as_deref(), Some("%50\\%%"));
        assert_eq!(search_pattern(None), None);
    }
}

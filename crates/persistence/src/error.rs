//! Mapping from `sqlx` errors to the engine error taxonomy.

use domain::{EngineError, EngineResult};

/// Converts a database error into an `EngineError`.
///
/// Unique violations become `Conflict` and foreign key violations `NotFound`;
/// everything else is a `Storage` failure.
pub fn map_db_error(err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::RowNotFound => EngineError::NotFound("Resource not found".into()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => EngineError::Conflict(conflict_message(db_err.constraint())),
            Some("23503") => EngineError::NotFound("Referenced resource not found".into()),
            _ => EngineError::Storage(format!("Database error: {}", db_err)),
        },
        _ => EngineError::Storage(format!("Database error: {}", err)),
    }
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("participants_phone_key") => {
            "A participant with this phone number already exists".into()
        }
        Some("survey_links_long_url_key") => "Survey link already exists".into(),
        Some("gift_cards_card_code_key") => "Gift card code already exists".into(),
        Some("idx_gift_card_assignments_active_participant") => {
            "Participant already has an active gift card".into()
        }
        _ => "Resource already exists".into(),
    }
}

/// `.map_db()` shorthand for `sqlx` results.
pub trait DbResultExt<T> {
    fn map_db(self) -> EngineResult<T>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn map_db(self) -> EngineResult<T> {
        self.map_err(map_db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_db_error(sqlx::Error::RowNotFound),
            EngineError::NotFound(_)
        ));
    }

    #[test]
    fn test_pool_errors_are_storage() {
        assert!(matches!(
            map_db_error(sqlx::Error::PoolTimedOut),
            EngineError::Storage(_)
        ));
    }

    #[test]
    fn test_conflict_messages() {
        assert_eq!(
            conflict_message(Some("gift_cards_card_code_key")),
            "Gift card code already exists"
        );
        assert_eq!(conflict_message(None), "Resource already exists");
    }
}

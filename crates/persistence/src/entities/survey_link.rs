//! Survey link entity.

use chrono::{DateTime, Utc};
use domain::models::survey_link::SurveyLink;
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::PoolItemStatusDb;

/// Database row mapping for the survey_links table.
#[derive(Debug, Clone, FromRow)]
pub struct SurveyLinkEntity {
    pub id: Uuid,
    pub long_url: String,
    pub short_url: Option<String>,
    pub status: PoolItemStatusDb,
    pub batch_label: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}

impl From<SurveyLinkEntity> for SurveyLink {
    fn from(entity: SurveyLinkEntity) -> Self {
        SurveyLink {
            id: entity.id,
            long_url: entity.long_url,
            short_url: entity.short_url,
            status: entity.status.into(),
            batch_label: entity.batch_label,
            uploaded_by: entity.uploaded_by,
            uploaded_at: entity.uploaded_at,
            assigned_at: entity.assigned_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::pool::PoolItemStatus;

    #[test]
    fn test_entity_to_domain() {
        let entity = SurveyLinkEntity {
            id: Uuid::new_v4(),
            long_url: "https://survey.example.com/s/abc".to_string(),
            short_url: Some("https://s.example/abc".to_string()),
            status: PoolItemStatusDb::Assigned,
            batch_label: None,
            uploaded_by: "admin".to_string(),
            uploaded_at: Utc::now(),
            assigned_at: Some(Utc::now()),
        };

        let link: SurveyLink = entity.into();
        assert_eq!(link.status, PoolItemStatus::Assigned);
        assert_eq!(link.delivery_url(), "https://s.example/abc");
    }
}

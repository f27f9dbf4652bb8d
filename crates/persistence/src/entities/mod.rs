//! Database entity definitions.
//!
//! Entities map directly to database rows and convert into domain models.

pub mod assignment;
pub mod distribution_log;
pub mod enrollment;
pub mod enums;
pub mod gift_card;
pub mod invitation;
pub mod participant;
pub mod survey_link;
pub mod unsent_audit;

pub use assignment::GiftCardAssignmentEntity;
pub use distribution_log::DistributionLogEntity;
pub use enrollment::EnrollmentConfigEntity;
pub use enums::{
    AssignmentStatusDb, DeliveryMethodDb, DistributionActionDb, GiftCardTypeDb, PoolItemStatusDb,
    ReversalTriggerDb,
};
pub use gift_card::GiftCardEntity;
pub use invitation::InvitationEntity;
pub use participant::ParticipantEntity;
pub use survey_link::SurveyLinkEntity;
pub use unsent_audit::UnsentAuditEntity;

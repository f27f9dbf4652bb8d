//! Domain models for the allocation engine.

pub mod allocation;
pub mod assignment;
pub mod distribution_log;
pub mod enrollment;
pub mod gift_card;
pub mod invitation;
pub mod participant;
pub mod pool;
pub mod reversal;
pub mod survey_link;
pub mod unsent_audit;
pub mod upload;

pub use allocation::{BatchSendResult, ClaimOutcome, GiftCardClaim, LinkClaim};
pub use assignment::{AssignmentStatus, DeliveryMethod, GiftCardAssignment, NewAssignment};
pub use distribution_log::{DistributionAction, DistributionLogEntry};
pub use enrollment::{EnrollmentConfig, EnrollmentDecision, EnrollmentStatusView};
pub use gift_card::{GiftCard, GiftCardType, NewGiftCard};
pub use invitation::Invitation;
pub use participant::{EligibleParticipant, NewParticipant, Participant};
pub use pool::{GiftCardPoolCounts, LinkPoolCounts, ListPoolQuery, PoolItemStatus, PoolKind};
pub use reversal::{CascadeReport, ReversalAck, ReversalOutcome};
pub use survey_link::{NewSurveyLink, SurveyLink};
pub use unsent_audit::{ParticipantSnapshot, ReversalTrigger, UnsentAuditRecord};
pub use upload::{UploadErrorReason, UploadResult, UploadRowError};

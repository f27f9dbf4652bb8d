//! Database enum types and their domain conversions.

use domain::models::assignment::{AssignmentStatus, DeliveryMethod};
use domain::models::distribution_log::DistributionAction;
use domain::models::gift_card::GiftCardType;
use domain::models::pool::PoolItemStatus;
use domain::models::unsent_audit::ReversalTrigger;

/// Database enum for pool item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "pool_item_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolItemStatusDb {
    Available,
    Assigned,
    Expired,
    Invalid,
}

impl From<PoolItemStatusDb> for PoolItemStatus {
    fn from(status: PoolItemStatusDb) -> Self {
        match status {
            PoolItemStatusDb::Available => PoolItemStatus::Available,
            PoolItemStatusDb::Assigned => PoolItemStatus::Assigned,
            PoolItemStatusDb::Expired => PoolItemStatus::Expired,
            PoolItemStatusDb::Invalid => PoolItemStatus::Invalid,
        }
    }
}

impl From<PoolItemStatus> for PoolItemStatusDb {
    fn from(status: PoolItemStatus) -> Self {
        match status {
            PoolItemStatus::Available => PoolItemStatusDb::Available,
            PoolItemStatus::Assigned => PoolItemStatusDb::Assigned,
            PoolItemStatus::Expired => PoolItemStatusDb::Expired,
            PoolItemStatus::Invalid => PoolItemStatusDb::Invalid,
        }
    }
}

/// Database enum for gift card brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "gift_card_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GiftCardTypeDb {
    Amazon,
    Visa,
    Target,
    Other,
}

impl From<GiftCardTypeDb> for GiftCardType {
    fn from(card_type: GiftCardTypeDb) -> Self {
        match card_type {
            GiftCardTypeDb::Amazon => GiftCardType::Amazon,
            GiftCardTypeDb::Visa => GiftCardType::Visa,
            GiftCardTypeDb::Target => GiftCardType::Target,
            GiftCardTypeDb::Other => GiftCardType::Other,
        }
    }
}

impl From<GiftCardType> for GiftCardTypeDb {
    fn from(card_type: GiftCardType) -> Self {
        match card_type {
            GiftCardType::Amazon => GiftCardTypeDb::Amazon,
            GiftCardType::Visa => GiftCardTypeDb::Visa,
            GiftCardType::Target => GiftCardTypeDb::Target,
            GiftCardType::Other => GiftCardTypeDb::Other,
        }
    }
}

/// Database enum for gift card assignment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "assignment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatusDb {
    Sent,
    Delivered,
    Redeemed,
    Unsent,
}

impl From<AssignmentStatusDb> for AssignmentStatus {
    fn from(status: AssignmentStatusDb) -> Self {
        match status {
            AssignmentStatusDb::Sent => AssignmentStatus::Sent,
            AssignmentStatusDb::Delivered => AssignmentStatus::Delivered,
            AssignmentStatusDb::Redeemed => AssignmentStatus::Redeemed,
            AssignmentStatusDb::Unsent => AssignmentStatus::Unsent,
        }
    }
}

impl From<AssignmentStatus> for AssignmentStatusDb {
    fn from(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Sent => AssignmentStatusDb::Sent,
            AssignmentStatus::Delivered => AssignmentStatusDb::Delivered,
            AssignmentStatus::Redeemed => AssignmentStatusDb::Redeemed,
            AssignmentStatus::Unsent => AssignmentStatusDb::Unsent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "delivery_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethodDb {
    Email,
    Sms,
    Both,
}

impl From<DeliveryMethodDb> for DeliveryMethod {
    fn from(method: DeliveryMethodDb) -> Self {
        match method {
            DeliveryMethodDb::Email => DeliveryMethod::Email,
            DeliveryMethodDb::Sms => DeliveryMethod::Sms,
            DeliveryMethodDb::Both => DeliveryMethod::Both,
        }
    }
}

impl From<DeliveryMethod> for DeliveryMethodDb {
    fn from(method: DeliveryMethod) -> Self {
        match method {
            DeliveryMethod::Email => DeliveryMethodDb::Email,
            DeliveryMethod::Sms => DeliveryMethodDb::Sms,
            DeliveryMethod::Both => DeliveryMethodDb::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "reversal_trigger", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReversalTriggerDb {
    Admin,
    ParticipantDeletion,
}

impl From<ReversalTriggerDb> for ReversalTrigger {
    fn from(trigger: ReversalTriggerDb) -> Self {
        match trigger {
            ReversalTriggerDb::Admin => ReversalTrigger::Admin,
            ReversalTriggerDb::ParticipantDeletion => ReversalTrigger::ParticipantDeletion,
        }
    }
}

impl From<ReversalTrigger> for ReversalTriggerDb {
    fn from(trigger: ReversalTrigger) -> Self {
        match trigger {
            ReversalTrigger::Admin => ReversalTriggerDb::Admin,
            ReversalTrigger::ParticipantDeletion => ReversalTriggerDb::ParticipantDeletion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "distribution_action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionActionDb {
    Created,
    Dispatched,
    Resent,
    DeliveryReported,
    MarkedDelivered,
    MarkedRedeemed,
    NotesUpdated,
    Unsent,
}

impl From<DistributionActionDb> for DistributionAction {
    fn from(action: DistributionActionDb) -> Self {
        match action {
            DistributionActionDb::Created => DistributionAction::Created,
            DistributionActionDb::Dispatched => DistributionAction::Dispatched,
            DistributionActionDb::Resent => DistributionAction::Resent,
            DistributionActionDb::DeliveryReported => DistributionAction::DeliveryReported,
            DistributionActionDb::MarkedDelivered => DistributionAction::MarkedDelivered,
            DistributionActionDb::MarkedRedeemed => DistributionAction::MarkedRedeemed,
            DistributionActionDb::NotesUpdated => DistributionAction::NotesUpdated,
            DistributionActionDb::Unsent => DistributionAction::Unsent,
        }
    }
}

impl From<DistributionAction> for DistributionActionDb {
    fn from(action: DistributionAction) -> Self {
        match action {
            DistributionAction::Created => DistributionActionDb::Created,
            DistributionAction::Dispatched => DistributionActionDb::Dispatched,
            DistributionAction::Resent => DistributionActionDb::Resent,
            DistributionAction::DeliveryReported => DistributionActionDb::DeliveryReported,
            DistributionAction::MarkedDelivered => DistributionActionDb::MarkedDelivered,
            DistributionAction::MarkedRedeemed => DistributionActionDb::MarkedRedeemed,
            DistributionAction::NotesUpdated => DistributionActionDb::NotesUpdated,
            DistributionAction::Unsent => DistributionActionDb::Unsent,
        }
    }
}

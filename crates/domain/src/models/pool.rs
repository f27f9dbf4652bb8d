//! Pool item status and pool-level projections shared by both pools.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The two allocatable pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Link,
    GiftCard,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Link => "link",
            PoolKind::GiftCard => "gift_card",
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolKind::Link => write!(f, "survey link"),
            PoolKind::GiftCard => write!(f, "gift card"),
        }
    }
}

/// Status of a pool item. Links only use `Available` and `Assigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolItemStatus {
    Available,
    Assigned,
    Expired,
    Invalid,
}

impl PoolItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolItemStatus::Available => "AVAILABLE",
            PoolItemStatus::Assigned => "ASSIGNED",
            PoolItemStatus::Expired => "EXPIRED",
            PoolItemStatus::Invalid => "INVALID",
        }
    }

    /// Deletion is refused while an item is held by an assignment.
    pub fn is_deletable(&self) -> bool {
        !matches!(self, PoolItemStatus::Assigned)
    }
}

impl FromStr for PoolItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Ok(PoolItemStatus::Available),
            "ASSIGNED" => Ok(PoolItemStatus::Assigned),
            "EXPIRED" => Ok(PoolItemStatus::Expired),
            "INVALID" => Ok(PoolItemStatus::Invalid),
            _ => Err(format!("Unknown pool item status: {}", s)),
        }
    }
}

impl std::fmt::Display for PoolItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters for pool listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListPoolQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<PoolItemStatus>,
    /// Case-insensitive match on code, URL or batch label.
    pub search: Option<String>,
}

impl ListPoolQuery {
    pub fn page_params(&self) -> shared::pagination::PageParams {
        shared::pagination::PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Search term with surrounding whitespace removed; `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Status counts for the survey link pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkPoolCounts {
    pub total: i64,
    pub available: i64,
    pub assigned: i64,
}

/// Status counts for the gift card pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GiftCardPoolCounts {
    pub total_cards: i64,
    pub available_cards: i64,
    pub assigned_cards: i64,
    pub expired_cards: i64,
    pub invalid_cards: i64,
}

impl GiftCardPoolCounts {
    pub fn add(&mut self, status: PoolItemStatus) {
        self.total_cards += 1;
        match status {
            PoolItemStatus::Available => self.available_cards += 1,
            PoolItemStatus::Assigned => self.assigned_cards += 1,
            PoolItemStatus::Expired => self.expired_cards += 1,
            PoolItemStatus::Invalid => self.invalid_cards += 1,
        }
    }
}

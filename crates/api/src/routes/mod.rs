//! HTTP route handlers.

pub mod assignments;
pub mod audit;
pub mod enrollment;
pub mod gift_cards;
pub mod health;
pub mod invitations;
pub mod links;
pub mod participants;

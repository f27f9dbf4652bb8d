//! Engine services.
//!
//! Services hold an `Arc<dyn AllocationStore>` and contain the business
//! rules; every state change they make is a single atomic store call.

pub mod allocation;
pub mod cascade;
pub mod enrollment;
pub mod ingestion;
pub mod ledger;
pub mod notification;
pub mod reversal;

pub use allocation::AllocationService;
pub use cascade::CascadeCoordinator;
pub use enrollment::EnrollmentGate;
pub use ingestion::{parse_gift_card_file, parse_link_file, IngestionService};
pub use ledger::{AssignmentLedger, UncompleteOutcome};
pub use notification::{MockNotificationDispatcher, NotificationDispatcher};
pub use reversal::{ReversalService, UNSEND_CONFIRMATION_PHRASE};

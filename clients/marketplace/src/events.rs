use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use ethers::types::{Address, U256};

use crate::errors::FieldError;
use crate::types::{TxHash, TxKind};

/// Receives user-facing notifications (toasts, close and refresh signals).
pub trait EventSink: Send + Sync {
    fn publish(&self, event: MarketplaceEvent);
}

/// Every notification the lifecycle can raise.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MarketplaceEvent {
    ValidationFailed(ValidationFailedEventData),
    WalletRequired(WalletRequiredEventData),
    ApprovalRequested(ApprovalRequestedEventData),
    ApprovalGranted(ApprovalGrantedEventData),
    TransactionSubmitted(TransactionSubmittedEventData),
    ListingCreated(ListingCreatedEventData),
    ListingPurchased(ListingPurchasedEventData),
    ListingCancelled(ListingCancelledEventData),
    TransactionFailed(TransactionFailedEventData),
    RefreshRequested(RefreshRequestedEventData),
}

/// Event payload that can be handed to an [`EventSink`].
pub trait EventData: Debug + Into<MarketplaceEvent> {
    const NAME: &'static str;

    /// Traces the event and forwards it to `sink`.
    fn publish(self, sink: &dyn EventSink) {
        tracing::debug!(event = Self::NAME, data = ?self, "publish");
        sink.publish(self.into());
    }
}

macro_rules! event_data {
    ($data:ident => $variant:ident, $name:literal) => {
        impl From<$data> for MarketplaceEvent {
            fn from(data: $data) -> Self {
                MarketplaceEvent::$variant(data)
            }
        }

        impl EventData for $data {
            const NAME: &'static str = $name;
        }
    };
}

/// Event emitted when user input fails validation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationFailedEventData {
    pub kind: TxKind,
    pub errors: Vec<FieldError>,
}

/// Event emitted when a write is attempted with no connected wallet
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletRequiredEventData {
    pub kind: TxKind,
}

/// Event emitted when an approval transaction is about to be requested
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovalRequestedEventData {
    pub contract: Address,
    pub operator: Address,
}

/// Event emitted when an approval transaction is confirmed
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovalGrantedEventData {
    pub contract: Address,
    pub operator: Address,
    pub hash: TxHash,
}

/// Event emitted when the primary transaction has a hash
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionSubmittedEventData {
    pub kind: TxKind,
    pub hash: TxHash,
}

/// Event emitted when a create-listing transaction is confirmed
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListingCreatedEventData {
    pub hash: TxHash,
    pub asset_contract: Address,
    pub token_id: U256,
}

/// Event emitted when a buy transaction is confirmed
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListingPurchasedEventData {
    pub hash: TxHash,
    pub listing_id: U256,
    pub buyer: Address,
}

/// Event emitted when a cancel transaction is confirmed
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListingCancelledEventData {
    pub hash: TxHash,
    pub listing_id: U256,
}

/// Event emitted when an action ends in failure
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionFailedEventData {
    pub kind: TxKind,
    pub hash: Option<TxHash>,
    pub reason: String,
}

/// Event emitted after a confirmed action; views should close and refetch
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefreshRequestedEventData {
    pub hash: TxHash,
}

event_data!(ValidationFailedEventData => ValidationFailed, "validation_failed");
event_data!(WalletRequiredEventData => WalletRequired, "wallet_required");
event_data!(ApprovalRequestedEventData => ApprovalRequested, "approval_requested");
event_data!(ApprovalGrantedEventData => ApprovalGranted, "approval_granted");
event_data!(TransactionSubmittedEventData => TransactionSubmitted, "transaction_submitted");
event_data!(ListingCreatedEventData => ListingCreated, "listing_created");
event_data!(ListingPurchasedEventData => ListingPurchased, "listing_purchased");
event_data!(ListingCancelledEventData => ListingCancelled, "listing_cancelled");
event_data!(TransactionFailedEventData => TransactionFailed, "transaction_failed");
event_data!(RefreshRequestedEventData => RefreshRequested, "refresh_requested");

impl MarketplaceEvent {
    /// True for the terminal success notifications.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            MarketplaceEvent::ListingCreated(_)
                | MarketplaceEvent::ListingPurchased(_)
                | MarketplaceEvent::ListingCancelled(_)
        )
    }
}

/// In-memory sink; the presentation layer drains it into toasts.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<MarketplaceEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarketplaceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drain(&self) -> Vec<MarketplaceEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn count(&self, predicate: impl Fn(&MarketplaceEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: MarketplaceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

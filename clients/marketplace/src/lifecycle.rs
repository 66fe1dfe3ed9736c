//! Create, buy and cancel flows.
//!
//! Each call runs one independent [`ListingAction`] through
//! `Idle -> Validating -> (Approving ->)? Submitting -> Pending -> {Confirmed, Failed}`.
//! Steps inside one action are strictly sequential; separate actions share nothing
//! but the collaborators. Dropping an action's future after submission only stops
//! tracking: the transaction still settles on-chain.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::client::{ChainClient, CreateListingParams, TransactionRequest, Wallet};
use crate::config::MarketplaceConfig;
use crate::errors::{
    ConversionError, FieldError, LifecycleError, TransactionError, ValidationError,
};
use crate::events::*;
use crate::format::{is_native, native_token, to_base_units};
use crate::ownership::{parse_address, OwnershipResolver};
use crate::types::{
    Listing, ListingStatus, PendingTransaction, Receipt, TxHash, TxKind, TxStatus,
    DEFAULT_LISTING_DURATION,
};

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionState {
    Idle,
    Validating,
    Approving,
    Submitting,
    Pending,
    Confirmed,
    Failed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Confirmed | ActionState::Failed)
    }

    fn can_transition_to(self, next: ActionState) -> bool {
        use ActionState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                // no wallet connected
                | (Validating, Idle)
                | (Validating, Approving)
                | (Validating, Submitting)
                // approval check itself failed
                | (Validating, Failed)
                | (Approving, Submitting)
                | (Approving, Failed)
                | (Submitting, Pending)
                | (Submitting, Failed)
                | (Pending, Confirmed)
                | (Pending, Failed)
        )
    }
}

/// What a confirmed action reports.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Subject {
    Create { asset_contract: Address, token_id: U256 },
    Buy { listing_id: U256, buyer: Address },
    Cancel { listing_id: U256 },
}

/// One create, buy or cancel attempt and everything it produced.
pub struct ListingAction {
    kind: TxKind,
    state: ActionState,
    subject: Option<Subject>,
    validation: Option<ValidationError>,
    wallet_required: bool,
    approval: Option<PendingTransaction>,
    pending: Option<PendingTransaction>,
    failure: Option<LifecycleError>,
    events: Arc<dyn EventSink>,
}

impl ListingAction {
    fn new(kind: TxKind, events: Arc<dyn EventSink>) -> Self {
        Self {
            kind,
            state: ActionState::Idle,
            subject: None,
            validation: None,
            wallet_required: false,
            approval: None,
            pending: None,
            failure: None,
            events,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    /// Field errors when the action halted in `Validating`.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation.as_ref()
    }

    /// True when the action stopped because no wallet was connected.
    pub fn wallet_required(&self) -> bool {
        self.wallet_required
    }

    pub fn approval(&self) -> Option<&PendingTransaction> {
        self.approval.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.pending.as_ref().and_then(PendingTransaction::hash)
    }

    /// Cause of a `Failed` action.
    pub fn failure(&self) -> Option<&LifecycleError> {
        self.failure.as_ref()
    }

    fn transition(&mut self, next: ActionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(kind = ?self.kind, from = ?self.state, to = ?next, "action transition");
        self.state = next;
    }

    fn reject(&mut self, err: ValidationError) {
        ValidationFailedEventData {
            kind: self.kind,
            errors: err.errors.clone(),
        }
        .publish(&*self.events);
        self.validation = Some(err);
    }

    fn require_wallet(&mut self) {
        self.transition(ActionState::Idle);
        self.wallet_required = true;
        WalletRequiredEventData { kind: self.kind }.publish(&*self.events);
    }

    fn fail(&mut self, err: LifecycleError) {
        if self.state.is_terminal() {
            return;
        }
        error!(kind = ?self.kind, error = %err, "action failed");
        if let Some(pending) = self.pending.as_mut() {
            pending.mark_failed();
        }
        self.transition(ActionState::Failed);
        TransactionFailedEventData {
            kind: self.kind,
            hash: err.hash().or_else(|| self.hash()),
            reason: err.to_string(),
        }
        .publish(&*self.events);
        self.failure = Some(err);
    }

    fn submitted(&mut self, hash: TxHash) {
        let mut pending = PendingTransaction::new(self.kind);
        pending.submitted(hash);
        self.pending = Some(pending);
        self.transition(ActionState::Pending);
        info!(kind = ?self.kind, hash = ?hash, "transaction submitted");
        TransactionSubmittedEventData {
            kind: self.kind,
            hash,
        }
        .publish(&*self.events);
    }

    /// Applies a receipt notification for the pending transaction.
    ///
    /// Settles once: returns `true` only for the notification that moved the
    /// action to a terminal state. Duplicates and foreign hashes are ignored.
    pub fn on_receipt(&mut self, receipt: &Receipt) -> bool {
        if self.state != ActionState::Pending {
            debug!(hash = ?receipt.tx_hash, state = ?self.state, "ignoring receipt");
            return false;
        }
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        match pending.settle(receipt) {
            None => {
                debug!(hash = ?receipt.tx_hash, "ignoring receipt");
                false
            }
            Some(TxStatus::Confirmed) => {
                self.transition(ActionState::Confirmed);
                info!(kind = ?self.kind, hash = ?receipt.tx_hash, "transaction confirmed");
                self.report_success(receipt.tx_hash);
                true
            }
            Some(_) => {
                self.fail(TransactionError::Reverted {
                    hash: receipt.tx_hash,
                }
                .into());
                true
            }
        }
    }

    fn report_success(&self, hash: TxHash) {
        let events = &*self.events;
        match self.subject.clone() {
            Some(Subject::Create {
                asset_contract,
                token_id,
            }) => ListingCreatedEventData {
                hash,
                asset_contract,
                token_id,
            }
            .publish(events),
            Some(Subject::Buy { listing_id, buyer }) => ListingPurchasedEventData {
                hash,
                listing_id,
                buyer,
            }
            .publish(events),
            Some(Subject::Cancel { listing_id }) => {
                ListingCancelledEventData { hash, listing_id }.publish(events)
            }
            None => {}
        }
        RefreshRequestedEventData { hash }.publish(events);
    }
}

// ============================================================================
// INPUT
// ============================================================================

/// Sell form input, as typed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListingForm {
    pub nft_address: String,
    pub token_id: String,
    /// Decimal price in the chain's native currency
    pub price: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub reserved: bool,
}

/// A sell form that passed validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidatedListing {
    pub asset_contract: Address,
    pub token_id: U256,
    pub price: Decimal,
    pub price_per_token_wei: U256,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub reserved: bool,
}

impl ListingForm {
    /// Validates every field, collecting all errors.
    ///
    /// Without explicit bounds the window is `now .. now + 7 days`; a lone
    /// start gets seven days from the start, a lone end starts now.
    pub fn validate(&self, now: u64, decimals: u32) -> Result<ValidatedListing, ValidationError> {
        let mut errors = Vec::new();

        let nft_address = self.nft_address.trim();
        let asset_contract = if nft_address.is_empty() {
            errors.push(FieldError::NftAddressRequired);
            None
        } else {
            let parsed = parse_address(nft_address);
            if parsed.is_none() {
                errors.push(FieldError::InvalidNftAddress);
            }
            parsed
        };

        let token_id = self.token_id.trim();
        let token_id = if token_id.is_empty() {
            errors.push(FieldError::TokenIdRequired);
            None
        } else if !token_id.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(FieldError::InvalidTokenId);
            None
        } else {
            let parsed = U256::from_dec_str(token_id).ok();
            if parsed.is_none() {
                errors.push(FieldError::InvalidTokenId);
            }
            parsed
        };

        let price = self.price.trim();
        let price = if price.is_empty() {
            errors.push(FieldError::PriceRequired);
            None
        } else {
            match Decimal::from_str(price) {
                Err(_) => {
                    errors.push(FieldError::InvalidPrice);
                    None
                }
                Ok(value) => match to_base_units(&value, decimals) {
                    Ok(wei) => Some((value, wei)),
                    Err(ConversionError::Negative) => {
                        errors.push(FieldError::NegativePrice);
                        None
                    }
                    Err(ConversionError::TooPrecise { decimals }) => {
                        errors.push(FieldError::PriceTooPrecise { decimals });
                        None
                    }
                    Err(ConversionError::Overflow) => {
                        errors.push(FieldError::InvalidPrice);
                        None
                    }
                },
            }
        };

        // Dates before the epoch have no on-chain timestamp.
        let seconds = |t: DateTime<Utc>| u64::try_from(t.timestamp()).ok();
        let window = match (self.start.map(seconds), self.end.map(seconds)) {
            (Some(None), _) | (_, Some(None)) => None,
            (Some(Some(start)), Some(Some(end))) => Some((start, end)),
            (Some(Some(start)), None) => {
                Some((start, start.saturating_add(DEFAULT_LISTING_DURATION)))
            }
            (None, Some(Some(end))) => Some((now, end)),
            (None, None) => Some((now, now.saturating_add(DEFAULT_LISTING_DURATION))),
        };
        let (start_timestamp, end_timestamp) = match window {
            Some((start, end)) if start < end => (start, end),
            _ => {
                errors.push(FieldError::InvalidWindow);
                (0, 0)
            }
        };

        match (asset_contract, token_id, price) {
            (Some(asset_contract), Some(token_id), Some((price, price_per_token_wei)))
                if errors.is_empty() =>
            {
                Ok(ValidatedListing {
                    asset_contract,
                    token_id,
                    price,
                    price_per_token_wei,
                    start_timestamp,
                    end_timestamp,
                    reserved: self.reserved,
                })
            }
            _ => Err(ValidationError { errors }),
        }
    }
}

impl ValidatedListing {
    pub fn into_params(self, currency: Address) -> CreateListingParams {
        CreateListingParams {
            asset_contract: self.asset_contract,
            token_id: self.token_id,
            quantity: U256::one(),
            currency,
            price_per_token_wei: self.price_per_token_wei,
            start_timestamp: self.start_timestamp,
            end_timestamp: self.end_timestamp,
            reserved: self.reserved,
        }
    }
}

/// Whether `account` may buy `listing` at `now`.
pub fn can_buy(listing: &Listing, account: Address, now: u64) -> Result<(), FieldError> {
    let status = listing.effective_status(now);
    if status != ListingStatus::Active {
        return Err(FieldError::ListingNotActive { status });
    }
    if listing.is_created_by(account) || listing.is_owned_by(account) {
        return Err(FieldError::OwnListing);
    }
    Ok(())
}

/// Whether `account` may cancel `listing`.
pub fn can_cancel(listing: &Listing, account: Address) -> Result<(), FieldError> {
    if listing.is_created_by(account) || listing.is_owned_by(account) {
        Ok(())
    } else {
        Err(FieldError::NotListingOwner)
    }
}

fn now_seconds() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Runs listing actions against the chain collaborator.
pub struct LifecycleController<C: ?Sized, W: ?Sized> {
    client: Arc<C>,
    wallet: Arc<W>,
    resolver: OwnershipResolver<C>,
    config: Arc<MarketplaceConfig>,
    events: Arc<dyn EventSink>,
}

impl<C, W> LifecycleController<C, W>
where
    C: ChainClient + ?Sized,
    W: Wallet + ?Sized,
{
    pub fn new(
        client: Arc<C>,
        wallet: Arc<W>,
        config: Arc<MarketplaceConfig>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            resolver: OwnershipResolver::new(client.clone()),
            client,
            wallet,
            config,
            events,
        }
    }

    /// Lists an NFT for sale in the native currency.
    pub async fn create_listing(&self, form: &ListingForm) -> ListingAction {
        let mut action = ListingAction::new(TxKind::Create, self.events.clone());
        action.transition(ActionState::Validating);

        let decimals = self.config.chain.native_currency.decimals;
        let validated = match form.validate(now_seconds(), decimals) {
            Ok(validated) => validated,
            Err(err) => {
                action.reject(err);
                return action;
            }
        };

        let Some(seller) = self.wallet.active_account() else {
            action.require_wallet();
            return action;
        };

        action.subject = Some(Subject::Create {
            asset_contract: validated.asset_contract,
            token_id: validated.token_id,
        });

        if !self
            .approve(&mut action, validated.asset_contract, seller)
            .await
        {
            return action;
        }

        let request = TransactionRequest::CreateListing(validated.into_params(native_token()));
        self.submit(&mut action, request, seller).await;
        action
    }

    /// Buys one token from `listing` for the connected account.
    pub async fn buy(&self, listing: &Listing) -> ListingAction {
        let mut action = ListingAction::new(TxKind::Buy, self.events.clone());
        action.transition(ActionState::Validating);

        let now = now_seconds();
        let status = listing.effective_status(now);
        if status != ListingStatus::Active {
            action.reject(ValidationError::single(FieldError::ListingNotActive {
                status,
            }));
            return action;
        }

        let Some(buyer) = self.wallet.active_account() else {
            action.require_wallet();
            return action;
        };

        if let Err(err) = can_buy(listing, buyer, now) {
            action.reject(ValidationError::single(err));
            return action;
        }

        action.subject = Some(Subject::Buy {
            listing_id: listing.id,
            buyer,
        });

        // Native currency travels as the call's value, so only an ERC-20 needs an
        // allowance for the marketplace before the buy.
        let currency = listing.currency().unwrap_or_else(native_token);
        if !is_native(currency) && !self.approve(&mut action, currency, buyer).await {
            return action;
        }

        let request = TransactionRequest::BuyFromListing {
            listing_id: listing.id,
            quantity: U256::one(),
            recipient: buyer,
            currency,
            total_price: listing.price_per_token,
        };
        self.submit(&mut action, request, buyer).await;
        action
    }

    /// Cancels `listing`; only its creator or the asset owner may do so.
    pub async fn cancel(&self, listing: &Listing) -> ListingAction {
        let mut action = ListingAction::new(TxKind::Cancel, self.events.clone());
        action.transition(ActionState::Validating);

        let Some(account) = self.wallet.active_account() else {
            action.require_wallet();
            return action;
        };

        if let Err(err) = can_cancel(listing, account) {
            action.reject(ValidationError::single(err));
            return action;
        }

        action.subject = Some(Subject::Cancel {
            listing_id: listing.id,
        });

        let request = TransactionRequest::CancelListing {
            listing_id: listing.id,
        };
        self.submit(&mut action, request, account).await;
        action
    }

    /// Makes sure the marketplace may move `owner`'s assets in `contract`.
    ///
    /// Returns `false` with the action failed when the approval could not be
    /// confirmed; the primary transaction must not be sent in that case.
    async fn approve(
        &self,
        action: &mut ListingAction,
        contract: Address,
        owner: Address,
    ) -> bool {
        let operator = self.config.marketplace_address;
        match self.resolver.check_approval(contract, owner, operator).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                action.fail(err.into());
                return false;
            }
        }

        action.transition(ActionState::Approving);
        match self
            .resolver
            .request_approval(contract, owner, operator, &*self.events)
            .await
        {
            Ok(approval) => {
                action.approval = Some(approval);
                true
            }
            Err(err) => {
                action.fail(err.into());
                false
            }
        }
    }

    async fn submit(
        &self,
        action: &mut ListingAction,
        request: TransactionRequest,
        signer: Address,
    ) {
        action.transition(ActionState::Submitting);
        let kind = request.kind();
        let hash = match self.client.write(request, signer).await {
            Ok(hash) => hash,
            Err(source) => {
                action.fail(TransactionError::Submit { kind, source }.into());
                return;
            }
        };

        action.submitted(hash);
        match self.client.wait_for_receipt(hash).await {
            Ok(receipt) => {
                action.on_receipt(&receipt);
            }
            Err(source) => action.fail(TransactionError::Receipt { hash, source }.into()),
        }
    }
}

use std::sync::Arc;

use ethers::types::Address;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{ChainClient, TransactionRequest};
use crate::errors::{ApprovalError, FetchError};
use crate::events::*;
use crate::types::{OwnedAssetSet, PendingTransaction, TxKind, TxStatus};

/// `0x` followed by exactly 40 hex digits.
pub fn is_valid_address(value: &str) -> bool {
    match value.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn parse_address(value: &str) -> Option<Address> {
    if !is_valid_address(value) {
        return None;
    }
    value[2..].parse::<Address>().ok()
}

/// Owned-token and approval lookups against the chain collaborator.
pub struct OwnershipResolver<C: ?Sized> {
    client: Arc<C>,
}

impl<C: ?Sized> Clone for OwnershipResolver<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C: ChainClient + ?Sized> OwnershipResolver<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Tokens `owner` holds in the NFT contract given as user input.
    ///
    /// Input that is not a canonical hex address yields an empty set and the
    /// collaborator is never called: it fails on such input in ways that must
    /// not reach the user.
    pub async fn resolve_owned_assets(
        &self,
        nft_contract: &str,
        owner: Address,
    ) -> Result<OwnedAssetSet, FetchError> {
        let Some(contract) = parse_address(nft_contract.trim()) else {
            debug!(input = nft_contract, "skipping owned token lookup for invalid address");
            return Ok(OwnedAssetSet::empty());
        };
        let tokens = self
            .client
            .read_owned_tokens(contract, owner)
            .await
            .map_err(FetchError::OwnedTokens)?;
        Ok(OwnedAssetSet {
            contract: Some(contract),
            owner: Some(owner),
            tokens,
        })
    }

    pub async fn check_approval(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool, ApprovalError> {
        self.client
            .read_is_approved(contract, owner, operator)
            .await
            .map_err(|source| ApprovalError::Check { contract, source })
    }

    /// Submits an approval for `operator` and waits for its receipt.
    ///
    /// Returns only once the approval is confirmed on-chain.
    pub async fn request_approval(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
        events: &dyn EventSink,
    ) -> Result<PendingTransaction, ApprovalError> {
        ApprovalRequestedEventData { contract, operator }.publish(events);

        let mut pending = PendingTransaction::new(TxKind::Approve);
        let hash = self
            .client
            .write(TransactionRequest::Approve { contract, operator }, owner)
            .await
            .map_err(|source| ApprovalError::Submit { contract, source })?;
        pending.submitted(hash);

        let receipt = self
            .client
            .wait_for_receipt(hash)
            .await
            .map_err(|source| ApprovalError::Receipt { hash, source })?;

        match pending.settle(&receipt) {
            Some(TxStatus::Confirmed) => {
                ApprovalGrantedEventData {
                    contract,
                    operator,
                    hash,
                }
                .publish(events);
                Ok(pending)
            }
            _ => Err(ApprovalError::Reverted { hash }),
        }
    }

    /// Checks the approval and requests one when missing.
    ///
    /// Returns the approval transaction when one had to be sent.
    pub async fn ensure_approval(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
        events: &dyn EventSink,
    ) -> Result<Option<PendingTransaction>, ApprovalError> {
        if self.check_approval(contract, owner, operator).await? {
            return Ok(None);
        }
        self.request_approval(contract, owner, operator, events)
            .await
            .map(Some)
    }
}

// ============================================================================
// REACTIVE OWNED-ASSET WIRING
// ============================================================================

/// Inputs the owned-asset set is derived from
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OwnershipInput {
    /// NFT contract address as typed by the user
    pub nft_contract: String,
    pub owner: Option<Address>,
}

#[derive(Clone, Debug, Default)]
pub struct OwnedAssetsState {
    /// Inputs this state was computed from
    pub input: OwnershipInput,
    pub assets: OwnedAssetSet,
    pub error: Option<FetchError>,
    /// Number of recomputations so far
    pub revision: u64,
}

/// Recomputes the owned-asset set whenever the contract input or the owner changes.
///
/// Recomputation stops when the watcher is dropped.
pub struct OwnedAssetsWatcher {
    inputs: watch::Sender<OwnershipInput>,
    state: watch::Receiver<OwnedAssetsState>,
    task: JoinHandle<()>,
}

impl OwnedAssetsWatcher {
    pub fn spawn<C>(resolver: OwnershipResolver<C>, initial: OwnershipInput) -> Self
    where
        C: ChainClient + ?Sized + 'static,
    {
        let (inputs, mut inputs_rx) = watch::channel(initial);
        let (state_tx, state) = watch::channel(OwnedAssetsState::default());

        let task = tokio::spawn(async move {
            let mut revision = 0;
            loop {
                let input = inputs_rx.borrow_and_update().clone();
                revision += 1;

                let (assets, error) = match input.owner {
                    Some(owner) => {
                        match resolver.resolve_owned_assets(&input.nft_contract, owner).await {
                            Ok(assets) => (assets, None),
                            Err(err) => {
                                warn!(error = %err, "owned token lookup failed");
                                (OwnedAssetSet::empty(), Some(err))
                            }
                        }
                    }
                    None => (OwnedAssetSet::empty(), None),
                };

                let next = OwnedAssetsState {
                    input,
                    assets,
                    error,
                    revision,
                };
                if state_tx.send(next).is_err() {
                    break;
                }
                if inputs_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            inputs,
            state,
            task,
        }
    }

    pub fn set_contract(&self, nft_contract: impl Into<String>) {
        let nft_contract = nft_contract.into();
        self.inputs.send_if_modified(|input| {
            if input.nft_contract == nft_contract {
                return false;
            }
            input.nft_contract = nft_contract;
            true
        });
    }

    pub fn set_owner(&self, owner: Option<Address>) {
        self.inputs.send_if_modified(|input| {
            if input.owner == owner {
                return false;
            }
            input.owner = owner;
            true
        });
    }

    pub fn state(&self) -> OwnedAssetsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OwnedAssetsState> {
        self.state.clone()
    }
}

impl Drop for OwnedAssetsWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

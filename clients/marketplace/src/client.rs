//! Boundary collaborators: the chain client and the wallet account provider.
//!
//! Nothing in this crate signs, encodes or broadcasts transactions itself;
//! every read and write goes through [`ChainClient`].

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::errors::ChainError;
use crate::types::{OwnedToken, PageRequest, RawListing, Receipt, TxHash, TxKind};

/// Arguments of the marketplace `createListing` call
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateListingParams {
    pub asset_contract: Address,
    pub token_id: U256,
    pub quantity: U256,
    pub currency: Address,
    pub price_per_token_wei: U256,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub reserved: bool,
}

/// State-changing call submitted through [`ChainClient::write`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransactionRequest {
    CreateListing(CreateListingParams),
    BuyFromListing {
        listing_id: U256,
        quantity: U256,
        recipient: Address,
        currency: Address,
        total_price: U256,
    },
    CancelListing {
        listing_id: U256,
    },
    /// `setApprovalForAll(operator, true)` on an NFT contract, or an
    /// allowance for `operator` on an ERC-20 currency
    Approve {
        contract: Address,
        operator: Address,
    },
}

impl TransactionRequest {
    pub fn kind(&self) -> TxKind {
        match self {
            TransactionRequest::CreateListing(_) => TxKind::Create,
            TransactionRequest::BuyFromListing { .. } => TxKind::Buy,
            TransactionRequest::CancelListing { .. } => TxKind::Cancel,
            TransactionRequest::Approve { .. } => TxKind::Approve,
        }
    }
}

/// Contract reads, writes and receipt lookup, provided by the chain SDK.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Enumerates marketplace listings in contract order. With `only_valid`
    /// the contract filters to listings inside their window.
    async fn read_listings(
        &self,
        marketplace: Address,
        page: PageRequest,
        only_valid: bool,
    ) -> Result<Vec<RawListing>, ChainError>;

    /// ERC-721 tokens held by `owner` in `nft`.
    async fn read_owned_tokens(
        &self,
        nft: Address,
        owner: Address,
    ) -> Result<Vec<OwnedToken>, ChainError>;

    /// Whether `operator` may move `owner`'s assets held in `contract`.
    async fn read_is_approved(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool, ChainError>;

    /// Signs with `signer` and submits; returns the transaction hash.
    async fn write(
        &self,
        transaction: TransactionRequest,
        signer: Address,
    ) -> Result<TxHash, ChainError>;

    /// Waits for the receipt. No local timeout is applied.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, ChainError>;
}

/// Supplies the active signer address, if a wallet is connected.
pub trait Wallet: Send + Sync {
    fn active_account(&self) -> Option<Address>;
}

/// In-memory holder of the connected account for the session.
#[derive(Debug, Default)]
pub struct SessionWallet {
    account: Mutex<Option<Address>>,
}

impl SessionWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(account: Address) -> Self {
        Self {
            account: Mutex::new(Some(account)),
        }
    }

    pub fn connect(&self, account: Address) {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner) = Some(account);
    }

    pub fn disconnect(&self) {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Wallet for SessionWallet {
    fn active_account(&self) -> Option<Address> {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

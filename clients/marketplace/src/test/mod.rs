pub mod mapper_test;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

use crate::client::{ChainClient, SessionWallet, TransactionRequest};
use crate::config::{ChainConfig, MarketplaceConfig};
use crate::errors::ChainError;
use crate::events::EventLog;
use crate::types::*;
use crate::Marketplace;

// ============================================================================
// FAKE CHAIN
// ============================================================================

/// Every collaborator call, in the order it was made.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    ReadListings { only_valid: bool },
    ReadOwnedTokens { nft: Address, owner: Address },
    ReadIsApproved {
        contract: Address,
        owner: Address,
        operator: Address,
    },
    Write(TransactionRequest),
    WaitForReceipt(TxHash),
}

/// Scripted chain: listing pages are served from a queue, approvals become
/// effective when their receipt is fetched.
#[derive(Default)]
pub struct FakeChain {
    calls: Mutex<Vec<Call>>,
    listing_pages: Mutex<VecDeque<Result<Vec<RawListing>, ChainError>>>,
    owned: Mutex<HashMap<(Address, Address), Vec<OwnedToken>>>,
    owned_error: Mutex<Option<ChainError>>,
    approvals: Mutex<HashSet<(Address, Address, Address)>>,
    submitted: Mutex<HashMap<TxHash, (TransactionRequest, Address)>>,
    reject: Mutex<HashSet<TxKind>>,
    revert: Mutex<HashSet<TxKind>>,
    next_hash: AtomicU64,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<TransactionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn push_page(&self, page: Vec<RawListing>) {
        self.listing_pages.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_failures(&self, n: usize) {
        let mut pages = self.listing_pages.lock().unwrap();
        for i in 0..n {
            pages.push_back(Err(ChainError::Rpc(format!("node unavailable ({i})"))));
        }
    }

    pub fn set_owned(&self, nft: Address, owner: Address, tokens: Vec<OwnedToken>) {
        self.owned.lock().unwrap().insert((nft, owner), tokens);
    }

    pub fn fail_owned_reads(&self, err: ChainError) {
        *self.owned_error.lock().unwrap() = Some(err);
    }

    pub fn approve(&self, contract: Address, owner: Address, operator: Address) {
        self.approvals
            .lock()
            .unwrap()
            .insert((contract, owner, operator));
    }

    pub fn is_approved(&self, contract: Address, owner: Address, operator: Address) -> bool {
        self.approvals
            .lock()
            .unwrap()
            .contains(&(contract, owner, operator))
    }

    pub fn reject_writes(&self, kind: TxKind) {
        self.reject.lock().unwrap().insert(kind);
    }

    pub fn revert_receipts(&self, kind: TxKind) {
        self.revert.lock().unwrap().insert(kind);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn read_listings(
        &self,
        _marketplace: Address,
        _page: PageRequest,
        only_valid: bool,
    ) -> Result<Vec<RawListing>, ChainError> {
        self.record(Call::ReadListings { only_valid });
        self.listing_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn read_owned_tokens(
        &self,
        nft: Address,
        owner: Address,
    ) -> Result<Vec<OwnedToken>, ChainError> {
        self.record(Call::ReadOwnedTokens { nft, owner });
        if let Some(err) = self.owned_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .owned
            .lock()
            .unwrap()
            .get(&(nft, owner))
            .cloned()
            .unwrap_or_default())
    }

    async fn read_is_approved(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool, ChainError> {
        self.record(Call::ReadIsApproved {
            contract,
            owner,
            operator,
        });
        Ok(self.is_approved(contract, owner, operator))
    }

    async fn write(
        &self,
        transaction: TransactionRequest,
        signer: Address,
    ) -> Result<TxHash, ChainError> {
        self.record(Call::Write(transaction.clone()));
        if self.reject.lock().unwrap().contains(&transaction.kind()) {
            return Err(ChainError::Rejected("user denied signature".into()));
        }
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = H256::from_low_u64_be(n);
        self.submitted
            .lock()
            .unwrap()
            .insert(hash, (transaction, signer));
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, ChainError> {
        self.record(Call::WaitForReceipt(hash));
        let (request, signer) = self
            .submitted
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or_else(|| ChainError::Rpc("unknown transaction".into()))?;

        let status = if self.revert.lock().unwrap().contains(&request.kind()) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };
        if let (ReceiptStatus::Success, TransactionRequest::Approve { contract, operator }) =
            (status, &request)
        {
            self.approve(*contract, signer, *operator);
        }
        Ok(Receipt {
            tx_hash: hash,
            status,
            block_number: hash.to_low_u64_be(),
        })
    }
}

// ============================================================================
// SETUP
// ============================================================================

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn hex(address: Address) -> String {
    format!("{:?}", address)
}

pub fn marketplace_address() -> Address {
    addr(0xAA)
}

pub fn nft_contract() -> Address {
    addr(0x721)
}

pub fn usdc() -> Address {
    addr(0x20)
}

pub fn seller() -> Address {
    addr(0x5E11)
}

pub fn buyer() -> Address {
    addr(0xB0B)
}

pub fn test_config() -> MarketplaceConfig {
    MarketplaceConfig {
        client_id: "test-client".into(),
        marketplace_address: marketplace_address(),
        chain: ChainConfig::known(31),
    }
}

pub struct TestEnv {
    pub chain: Arc<FakeChain>,
    pub wallet: Arc<SessionWallet>,
    pub events: Arc<EventLog>,
    pub marketplace: Marketplace<FakeChain, SessionWallet>,
}

pub fn setup_test(account: Option<Address>) -> TestEnv {
    let chain = FakeChain::new();
    let wallet = Arc::new(match account {
        Some(account) => SessionWallet::connected(account),
        None => SessionWallet::new(),
    });
    let events = Arc::new(EventLog::new());
    let marketplace = Marketplace::new(
        test_config(),
        chain.clone(),
        wallet.clone(),
        events.clone(),
    );
    TestEnv {
        chain,
        wallet,
        events,
        marketplace,
    }
}

/// A complete raw record as the chain SDK returns it.
pub fn raw_listing(id: u64) -> RawListing {
    RawListing {
        id: Some(RawUint::Number(id)),
        asset_contract_address: Some(hex(nft_contract())),
        token_id: Some(RawUint::Text(id.to_string())),
        creator_address: Some(hex(seller())),
        status: Some("ACTIVE".into()),
        is_reserved_listing: Some(false),
        currency_value_per_token: Some(RawCurrencyValue {
            display_value: Some("0.1".into()),
            symbol: Some("rBTC".into()),
            token_address: Some(NATIVE_TOKEN_ADDRESS.into()),
        }),
        currency_contract_address: Some(NATIVE_TOKEN_ADDRESS.into()),
        price_per_token: Some(RawUint::Text("100000000000000000".into())),
        quantity: Some(RawUint::Number(1)),
        start_time_in_seconds: Some(RawUint::Number(1_000)),
        end_time_in_seconds: Some(RawUint::Number(4_000_000_000)),
        asset: Some(RawAsset {
            metadata: Some(RawMetadata {
                name: Some(format!("Token #{id}")),
                image: Some(format!("ipfs://image/{id}")),
                description: Some("test token".into()),
            }),
            owner: Some(hex(seller())),
            kind: Some("ERC721".into()),
        }),
    }
}

/// An active native-currency listing created by `seller()`.
pub fn active_listing(id: u64) -> Listing {
    crate::mapper::normalize(raw_listing(id)).unwrap()
}

/// An active listing priced in the `usdc()` ERC-20.
pub fn erc20_listing(id: u64) -> Listing {
    let mut listing = active_listing(id);
    listing.currency_value_per_token = Some(CurrencyValue {
        display_value: "25".into(),
        symbol: "USDC".into(),
        token_address: usdc(),
    });
    listing.price_per_token = U256::from(25_000_000u64);
    listing
}

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Transaction identifier assigned by the chain on submission.
pub type TxHash = H256;

/// Seconds in a day
pub const DAY_IN_SECONDS: u64 = 86_400;

/// Validity window applied when a listing is created without explicit bounds (7 days)
pub const DEFAULT_LISTING_DURATION: u64 = 7 * DAY_IN_SECONDS;

/// Listing poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Retries after a failed listing fetch before the error is surfaced
pub const DEFAULT_FETCH_RETRIES: u32 = 3;

/// Listings fetched per page
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Sentinel currency address the marketplace uses for the chain's native token
pub const NATIVE_TOKEN_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

// ============================================================================
// LISTING
// ============================================================================

/// Listing status
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ListingStatus {
    /// Listed on-chain, start time not reached yet
    Created = 1,
    /// Sold out
    Completed = 2,
    /// Withdrawn by its creator
    Cancelled = 3,
    /// Inside its validity window and purchasable
    #[default]
    Active = 4,
    /// End time passed without a buyer
    Expired = 5,
}

impl ListingStatus {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn from_u32(value: u32) -> Option<ListingStatus> {
        match value {
            1 => Some(ListingStatus::Created),
            2 => Some(ListingStatus::Completed),
            3 => Some(ListingStatus::Cancelled),
            4 => Some(ListingStatus::Active),
            5 => Some(ListingStatus::Expired),
            _ => None,
        }
    }

    /// Parses a status name as reported by the chain SDK, or a numeric code.
    ///
    /// `RESERVED` is an older display-only value; reservation is carried by
    /// [`Listing::is_reserved_listing`], so it reads as `Active`.
    pub fn parse(value: &str) -> Option<ListingStatus> {
        let value = value.trim();
        if let Ok(code) = value.parse::<u32>() {
            return ListingStatus::from_u32(code);
        }
        match value.to_ascii_uppercase().as_str() {
            "CREATED" => Some(ListingStatus::Created),
            "ACTIVE" | "RESERVED" => Some(ListingStatus::Active),
            "COMPLETED" => Some(ListingStatus::Completed),
            "CANCELLED" | "CANCELED" => Some(ListingStatus::Cancelled),
            "EXPIRED" => Some(ListingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ListingStatus::Completed | ListingStatus::Cancelled | ListingStatus::Expired
        )
    }
}

/// Price of one token in the listing's currency
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyValue {
    /// Human readable decimal amount
    pub display_value: String,
    pub symbol: String,
    /// ERC-20 contract, or the native sentinel
    pub token_address: Address,
}

/// Read-time snapshot of the listed token's metadata. Not authoritative.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub name: String,
    pub image: String,
    pub description: String,
    pub owner: Option<Address>,
    /// Token standard, e.g. `ERC721`
    pub kind: String,
}

/// One sale offer on the marketplace contract
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Opaque identifier assigned by the marketplace contract
    pub id: U256,
    pub asset_contract_address: Address,
    pub token_id: U256,
    pub creator_address: Address,
    pub status: ListingStatus,
    pub is_reserved_listing: bool,
    pub currency_value_per_token: Option<CurrencyValue>,
    /// Price per token in base units of the currency
    pub price_per_token: U256,
    pub quantity: U256,
    /// Seconds since epoch
    pub start_time: u64,
    /// Seconds since epoch
    pub end_time: u64,
    pub asset: AssetSnapshot,
}

impl Listing {
    /// Status at `now`, derived from the validity window.
    ///
    /// Terminal statuses are returned unchanged. The stored status is never mutated.
    pub fn effective_status(&self, now: u64) -> ListingStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if self.end_time != 0 && now >= self.end_time {
            return ListingStatus::Expired;
        }
        if now >= self.start_time {
            ListingStatus::Active
        } else {
            ListingStatus::Created
        }
    }

    pub fn is_created_by(&self, account: Address) -> bool {
        self.creator_address == account
    }

    pub fn is_owned_by(&self, account: Address) -> bool {
        self.asset.owner == Some(account)
    }

    /// Currency token the listing is priced in, `None` when the record carried no currency.
    pub fn currency(&self) -> Option<Address> {
        self.currency_value_per_token
            .as_ref()
            .map(|value| value.token_address)
    }
}

// ============================================================================
// RAW RECORDS
// ============================================================================

/// Integer the chain SDK reports either as a JSON number or as a decimal string.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawUint {
    Number(u64),
    Text(String),
}

impl RawUint {
    pub fn to_u256(&self) -> Option<U256> {
        match self {
            RawUint::Number(n) => Some(U256::from(*n)),
            RawUint::Text(s) => {
                let s = s.trim().trim_end_matches('n');
                if s.is_empty() {
                    return None;
                }
                U256::from_dec_str(s).ok()
            }
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        let value = self.to_u256()?;
        (value <= U256::from(u64::MAX)).then(|| value.as_u64())
    }

    pub fn text(&self) -> String {
        match self {
            RawUint::Number(n) => n.to_string(),
            RawUint::Text(s) => s.clone(),
        }
    }
}

impl From<u64> for RawUint {
    fn from(value: u64) -> Self {
        RawUint::Number(value)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawAsset {
    pub metadata: Option<RawMetadata>,
    pub owner: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCurrencyValue {
    pub display_value: Option<String>,
    pub symbol: Option<String>,
    pub token_address: Option<String>,
}

/// Listing record as returned by the chain collaborator; every field may be absent.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub id: Option<RawUint>,
    pub asset_contract_address: Option<String>,
    pub token_id: Option<RawUint>,
    pub creator_address: Option<String>,
    pub status: Option<String>,
    pub is_reserved_listing: Option<bool>,
    pub currency_value_per_token: Option<RawCurrencyValue>,
    pub currency_contract_address: Option<String>,
    pub price_per_token: Option<RawUint>,
    pub quantity: Option<RawUint>,
    pub start_time_in_seconds: Option<RawUint>,
    pub end_time_in_seconds: Option<RawUint>,
    pub asset: Option<RawAsset>,
}

/// Page window for listing enumeration
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub start: u64,
    pub count: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            start: 0,
            count: DEFAULT_PAGE_SIZE,
        }
    }
}

// ============================================================================
// OWNERSHIP
// ============================================================================

/// Token held by an owner in one NFT contract
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OwnedToken {
    pub token_id: U256,
    pub name: String,
    pub image: String,
}

/// Tokens a given owner holds in a given NFT contract. Derived, never persisted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OwnedAssetSet {
    pub contract: Option<Address>,
    pub owner: Option<Address>,
    pub tokens: Vec<OwnedToken>,
}

impl OwnedAssetSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn contains(&self, token_id: U256) -> bool {
        self.tokens.iter().any(|t| t.token_id == token_id)
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// What a transaction does
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Create,
    Buy,
    Cancel,
    Approve,
}

/// Settlement status of a submitted transaction
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Confirmed on-chain record of a transaction's outcome
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub status: ReceiptStatus,
    pub block_number: u64,
}

/// A transaction owned by the action that submitted it.
///
/// Settles at most once; later receipts for the same hash are ignored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingTransaction {
    hash: Option<TxHash>,
    kind: TxKind,
    status: TxStatus,
}

impl PendingTransaction {
    pub fn new(kind: TxKind) -> Self {
        Self {
            hash: None,
            kind,
            status: TxStatus::Submitted,
        }
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.hash
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn is_settled(&self) -> bool {
        self.status != TxStatus::Submitted
    }

    /// Records the hash returned on submission.
    pub fn submitted(&mut self, hash: TxHash) {
        self.hash = Some(hash);
    }

    /// Applies a receipt. Returns the new status the first time a receipt
    /// for this transaction's hash arrives, `None` otherwise.
    pub fn settle(&mut self, receipt: &Receipt) -> Option<TxStatus> {
        if self.is_settled() || self.hash != Some(receipt.tx_hash) {
            return None;
        }
        self.status = match receipt.status {
            ReceiptStatus::Success => TxStatus::Confirmed,
            ReceiptStatus::Reverted => TxStatus::Failed,
        };
        Some(self.status)
    }

    /// Marks the transaction failed without a receipt. No-op once settled.
    pub fn mark_failed(&mut self) {
        if !self.is_settled() {
            self.status = TxStatus::Failed;
        }
    }
}

use ethers::types::Address;
use thiserror::Error;

use crate::types::{ListingStatus, TxHash, TxKind};

/// Failure reported by the chain collaborator (RPC, signer or SDK layer).
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ChainError {
    /// Transport or node error while reading or writing
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The signer or wallet refused the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The collaborator gave up waiting on its own timeout
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// The collaborator returned a shape it could not decode
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// A raw listing record that cannot be turned into a [`crate::types::Listing`].
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum MalformedListingError {
    #[error("listing record has no id")]
    MissingId,
    #[error("listing record has no asset contract address")]
    MissingAssetContract,
    #[error("listing id {0:?} is not an unsigned integer")]
    InvalidId(String),
    #[error("asset contract address {0:?} is not a hex address")]
    InvalidAssetContract(String),
    #[error("listing record is not an object: {0}")]
    NotAnObject(String),
}

/// Listing query failure; the query keeps its previous page when this is set.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum FetchError {
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ChainError,
    },
    /// An empty page arrived while a non-empty one was on screen
    #[error("listing fetch returned no listings")]
    EmptyPage,
    #[error("owned token lookup failed: {0}")]
    OwnedTokens(#[source] ChainError),
}

/// The form or action field a [`FieldError`] belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    NftAddress,
    TokenId,
    Price,
    Window,
    Listing,
}

/// Field-level input error, shown inline next to the offending field.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum FieldError {
    #[error("NFT address is required")]
    NftAddressRequired,
    #[error("Invalid Ethereum address")]
    InvalidNftAddress,
    #[error("Token ID is required")]
    TokenIdRequired,
    #[error("Token ID must be a non-negative integer")]
    InvalidTokenId,
    #[error("Price is required")]
    PriceRequired,
    #[error("Invalid price")]
    InvalidPrice,
    #[error("Price must be positive")]
    NegativePrice,
    #[error("Price supports at most {decimals} decimal places")]
    PriceTooPrecise { decimals: u32 },
    #[error("Listing must end after it starts")]
    InvalidWindow,
    #[error("Listing is not active ({status:?})")]
    ListingNotActive { status: ListingStatus },
    #[error("You cannot buy your own listing")]
    OwnListing,
    #[error("Only the creator or owner can cancel this listing")]
    NotListingOwner,
}

impl FieldError {
    pub fn field(&self) -> Field {
        match self {
            FieldError::NftAddressRequired | FieldError::InvalidNftAddress => Field::NftAddress,
            FieldError::TokenIdRequired | FieldError::InvalidTokenId => Field::TokenId,
            FieldError::PriceRequired
            | FieldError::InvalidPrice
            | FieldError::NegativePrice
            | FieldError::PriceTooPrecise { .. } => Field::Price,
            FieldError::InvalidWindow => Field::Window,
            FieldError::ListingNotActive { .. }
            | FieldError::OwnListing
            | FieldError::NotListingOwner => Field::Listing,
        }
    }
}

/// One or more field errors; no transaction is attempted when this is returned.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[error("invalid input: {}", summarize(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// First error recorded against `field`, if any.
    pub fn for_field(&self, field: Field) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field() == field)
    }
}

#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ApprovalError {
    #[error("approval check for {contract:?} failed: {source}")]
    Check {
        contract: Address,
        #[source]
        source: ChainError,
    },
    #[error("approval transaction for {contract:?} could not be submitted: {source}")]
    Submit {
        contract: Address,
        #[source]
        source: ChainError,
    },
    #[error("no receipt for approval {hash:?}: {source}")]
    Receipt {
        hash: TxHash,
        #[source]
        source: ChainError,
    },
    #[error("approval transaction {hash:?} reverted")]
    Reverted { hash: TxHash },
}

#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum TransactionError {
    #[error("{kind:?} transaction could not be submitted: {source}")]
    Submit {
        kind: TxKind,
        #[source]
        source: ChainError,
    },
    #[error("no receipt for {hash:?}: {source}")]
    Receipt {
        hash: TxHash,
        #[source]
        source: ChainError,
    },
    #[error("transaction {hash:?} reverted")]
    Reverted { hash: TxHash },
}

/// Cause retained on a failed lifecycle action.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum LifecycleError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Missing or unusable startup configuration. Fatal: nothing is built without it.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ConfigurationError {
    #[error("{0} is not defined")]
    Missing(&'static str),
    #[error("{var} is not a hex address: {value:?}")]
    InvalidAddress { var: &'static str, value: String },
    #[error("{var} is not a chain id: {value:?}")]
    InvalidChainId { var: &'static str, value: String },
}

/// Decimal amount that does not fit the token's base units.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ConversionError {
    #[error("amount is negative")]
    Negative,
    #[error("amount has more than {decimals} decimal places")]
    TooPrecise { decimals: u32 },
    #[error("amount overflows 256 bits")]
    Overflow,
}

/// Stable numeric codes for the error taxonomy.
/// Codes start at 500 to stay clear of the contract revert codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ErrorCode {
    /// Field-level user input error
    Validation = 500,
    /// Raw listing record without id or asset contract
    MalformedListing = 501,
    /// Approval check or approval transaction failed
    Approval = 502,
    /// Primary transaction failed to submit or reverted
    Transaction = 503,
    /// Listing or ownership read failed
    Fetch = 504,
    /// Startup configuration missing or invalid
    Configuration = 505,
}

impl ErrorCode {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Validation
    }
}

impl MalformedListingError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::MalformedListing
    }
}

impl FetchError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Fetch
    }
}

impl ConfigurationError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Configuration
    }
}

impl LifecycleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::Approval(_) => ErrorCode::Approval,
            LifecycleError::Transaction(_) => ErrorCode::Transaction,
        }
    }

    /// Hash of the transaction that failed, when one was submitted.
    pub fn hash(&self) -> Option<TxHash> {
        match self {
            LifecycleError::Approval(ApprovalError::Receipt { hash, .. })
            | LifecycleError::Approval(ApprovalError::Reverted { hash })
            | LifecycleError::Transaction(TransactionError::Receipt { hash, .. })
            | LifecycleError::Transaction(TransactionError::Reverted { hash }) => Some(*hash),
            _ => None,
        }
    }
}

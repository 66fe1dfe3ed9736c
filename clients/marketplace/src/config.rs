use ethers::types::Address;

use crate::errors::ConfigurationError;
use crate::ownership::parse_address;
use crate::types::TxHash;

/// SDK client identifier
pub const CLIENT_ID_VAR: &str = "MARKETPLACE_CLIENT_ID";
/// Marketplace contract address
pub const CONTRACT_VAR: &str = "MARKETPLACE_CONTRACT";
/// Decimal chain id
pub const CHAIN_ID_VAR: &str = "MARKETPLACE_CHAIN_ID";
/// Optional RPC endpoint override
pub const RPC_URL_VAR: &str = "MARKETPLACE_RPC_URL";
/// Optional block explorer override
pub const EXPLORER_URL_VAR: &str = "MARKETPLACE_EXPLORER_URL";

/// Native currency of a chain
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

/// Chain the marketplace contract is deployed on
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChainConfig {
    pub id: u64,
    pub native_currency: NativeCurrency,
    pub rpc_url: Option<String>,
    pub explorer_url: Option<String>,
}

impl ChainConfig {
    /// Known chain parameters, or an 18-decimal `ETH` default for unknown ids.
    pub fn known(id: u64) -> Self {
        let (name, symbol, explorer) = match id {
            1 => ("Ether", "ETH", Some("https://etherscan.io")),
            31 => (
                "rBTC",
                "rBTC",
                Some("https://rootstock-testnet.blockscout.com"),
            ),
            11155111 => ("Sepolia Ether", "ETH", Some("https://sepolia.etherscan.io")),
            _ => ("Ether", "ETH", None),
        };
        Self {
            id,
            native_currency: NativeCurrency {
                name: name.to_string(),
                symbol: symbol.to_string(),
                decimals: 18,
            },
            rpc_url: None,
            explorer_url: explorer.map(str::to_string),
        }
    }

    pub fn tx_url(&self, hash: TxHash) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{:?}", base.trim_end_matches('/'), hash))
    }

    pub fn address_url(&self, address: Address) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/address/{:?}", base.trim_end_matches('/'), address))
    }
}

/// Marketplace configuration, required before anything is constructed
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarketplaceConfig {
    /// SDK client identifier
    pub client_id: String,
    /// Marketplace contract, also the operator approvals are granted to
    pub marketplace_address: Address,
    pub chain: ChainConfig,
}

impl MarketplaceConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigurationError::Missing(key));

        let client_id = require(CLIENT_ID_VAR)?;

        let contract = require(CONTRACT_VAR)?;
        let marketplace_address =
            parse_address(&contract).ok_or_else(|| ConfigurationError::InvalidAddress {
                var: CONTRACT_VAR,
                value: contract.clone(),
            })?;

        let chain_id = require(CHAIN_ID_VAR)?;
        let chain_id = chain_id
            .parse::<u64>()
            .map_err(|_| ConfigurationError::InvalidChainId {
                var: CHAIN_ID_VAR,
                value: chain_id.clone(),
            })?;

        let mut chain = ChainConfig::known(chain_id);
        chain.rpc_url = get(RPC_URL_VAR);
        if let Some(explorer) = get(EXPLORER_URL_VAR) {
            chain.explorer_url = Some(explorer);
        }

        Ok(Self {
            client_id,
            marketplace_address,
            chain,
        })
    }
}

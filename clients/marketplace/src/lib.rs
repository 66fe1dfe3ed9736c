//! MarketX marketplace client
//!
//! Listing lifecycle for an EVM NFT marketplace:
//! - Normalizing raw listing records into one [`Listing`] shape
//! - Polling the active listing page with stale-while-revalidate semantics
//! - Resolving owned tokens and marketplace approvals
//! - Driving create, buy and cancel transactions to confirmation
//!
//! Contract calls, signing and receipt lookup are delegated to a [`ChainClient`];
//! the connected account comes from a [`Wallet`].

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod format;
pub mod lifecycle;
pub mod mapper;
pub mod ownership;
pub mod query;
pub mod types;

#[cfg(test)]
mod test;

use std::sync::Arc;

pub use crate::client::{
    ChainClient, CreateListingParams, SessionWallet, TransactionRequest, Wallet,
};
pub use crate::config::{ChainConfig, MarketplaceConfig, NativeCurrency};
pub use crate::errors::*;
pub use crate::events::{EventLog, EventSink, MarketplaceEvent};
pub use crate::lifecycle::{ActionState, LifecycleController, ListingAction, ListingForm};
pub use crate::ownership::{
    is_valid_address, OwnedAssetsState, OwnedAssetsWatcher, OwnershipInput, OwnershipResolver,
};
pub use crate::query::{ListingQuery, QueryHandle, QueryOptions, QueryState};
pub use crate::types::*;

/// Application-wide handle: the one place the chain client, wallet,
/// configuration and event sink are wired together.
///
/// Every component gets its collaborators from here rather than from globals.
pub struct Marketplace<C: ?Sized, W: ?Sized> {
    config: Arc<MarketplaceConfig>,
    client: Arc<C>,
    wallet: Arc<W>,
    events: Arc<dyn EventSink>,
}

impl<C: ?Sized, W: ?Sized> Clone for Marketplace<C, W> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            client: self.client.clone(),
            wallet: self.wallet.clone(),
            events: self.events.clone(),
        }
    }
}

impl<C, W> Marketplace<C, W>
where
    C: ChainClient + ?Sized + 'static,
    W: Wallet + ?Sized,
{
    pub fn new(
        config: MarketplaceConfig,
        client: Arc<C>,
        wallet: Arc<W>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            wallet,
            events,
        }
    }

    /// Builds the handle from environment configuration.
    ///
    /// # Errors
    /// * `ConfigurationError` - If a required variable is missing or invalid
    pub fn from_env(
        client: Arc<C>,
        wallet: Arc<W>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigurationError> {
        let config = MarketplaceConfig::from_env()?;
        Ok(Self::new(config, client, wallet, events))
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        self.events.clone()
    }

    /// Listing query for this marketplace's contract.
    pub fn listings(&self, page: PageRequest) -> ListingQuery<C> {
        self.listings_with(page, QueryOptions::default())
    }

    pub fn listings_with(&self, page: PageRequest, options: QueryOptions) -> ListingQuery<C> {
        ListingQuery::with_options(
            self.client.clone(),
            self.config.marketplace_address,
            page,
            options,
        )
    }

    pub fn ownership(&self) -> OwnershipResolver<C> {
        OwnershipResolver::new(self.client.clone())
    }

    /// Owned-asset set for the connected account, recomputed as inputs change.
    pub fn watch_owned_assets(&self, nft_contract: impl Into<String>) -> OwnedAssetsWatcher {
        OwnedAssetsWatcher::spawn(
            self.ownership(),
            OwnershipInput {
                nft_contract: nft_contract.into(),
                owner: self.wallet.active_account(),
            },
        )
    }

    pub fn lifecycle(&self) -> LifecycleController<C, W> {
        LifecycleController::new(
            self.client.clone(),
            self.wallet.clone(),
            self.config.clone(),
            self.events.clone(),
        )
    }
}

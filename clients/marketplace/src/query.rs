use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::client::ChainClient;
use crate::errors::FetchError;
use crate::mapper::normalize_all;
use crate::types::{
    Listing, PageRequest, DEFAULT_FETCH_RETRIES, DEFAULT_POLL_INTERVAL_SECS,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QueryOptions {
    pub poll_interval: Duration,
    /// Immediate retries after a failed fetch, before the error is surfaced
    pub retries: u32,
    /// Ask the contract for listings inside their validity window only
    pub only_valid: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            retries: DEFAULT_FETCH_RETRIES,
            only_valid: false,
        }
    }
}

/// What the listing grid renders from.
#[derive(Clone, Debug, Default)]
pub struct QueryState {
    /// Last successful page; `None` until the first fetch succeeds
    pub listings: Option<Vec<Listing>>,
    /// No data yet and a fetch is in flight
    pub is_loading: bool,
    /// Any fetch in flight
    pub is_fetching: bool,
    /// Error of the latest fetch; cleared by the next success
    pub error: Option<FetchError>,
}

impl QueryState {
    pub fn listings(&self) -> &[Listing] {
        self.listings.as_deref().unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Keeps one page of the marketplace's listings fresh.
///
/// Failed fetches, and an empty page after a non-empty one, keep the previous
/// page visible and only set `error`.
pub struct ListingQuery<C: ?Sized> {
    client: Arc<C>,
    marketplace: Address,
    page: PageRequest,
    options: QueryOptions,
    state: watch::Sender<QueryState>,
}

impl<C: ChainClient + ?Sized + 'static> ListingQuery<C> {
    pub fn new(client: Arc<C>, marketplace: Address, page: PageRequest) -> Self {
        Self::with_options(client, marketplace, page, QueryOptions::default())
    }

    pub fn with_options(
        client: Arc<C>,
        marketplace: Address,
        page: PageRequest,
        options: QueryOptions,
    ) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            client,
            marketplace,
            page,
            options,
            state,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    /// Fetches the page once, retrying failed attempts without delay.
    pub async fn refresh(&self) -> QueryState {
        self.state.send_modify(|state| {
            state.is_fetching = true;
            state.is_loading = state.listings.is_none();
        });

        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            match self
                .client
                .read_listings(self.marketplace, self.page, self.options.only_valid)
                .await
            {
                Ok(raws) => break Ok(raws),
                Err(err) if attempts <= self.options.retries => {
                    debug!(attempt = attempts, error = %err, "listing fetch failed, retrying");
                }
                Err(source) => break Err(FetchError::Exhausted { attempts, source }),
            }
        };

        self.state.send_modify(|state| {
            state.is_fetching = false;
            state.is_loading = false;
            match result {
                Ok(raws) if raws.is_empty() && !state.listings().is_empty() => {
                    warn!("listing fetch returned an empty page, keeping previous page");
                    state.error = Some(FetchError::EmptyPage);
                }
                Ok(raws) => {
                    state.listings = Some(normalize_all(raws));
                    state.error = None;
                }
                Err(err) => {
                    warn!(error = %err, "listing fetch failed, keeping previous page");
                    state.error = Some(err);
                }
            }
        });
        self.state()
    }

    /// Starts polling on the configured interval, first fetch immediately.
    ///
    /// Polling stops when the returned handle is dropped.
    pub fn spawn(self) -> QueryHandle {
        let state = self.subscribe();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(self.options.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        });
        QueryHandle { state, task }
    }
}

/// A mounted, polling listing query.
pub struct QueryHandle {
    state: watch::Receiver<QueryState>,
    task: JoinHandle<()>,
}

impl QueryHandle {
    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.clone()
    }

    /// Stops polling. Equivalent to dropping the handle.
    pub fn unmount(self) {}

    pub fn is_polling(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

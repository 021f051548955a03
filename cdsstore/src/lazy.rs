//! Containers populated on demand from a remote source.
//!
//! A [`LazyContainer`] asks its [`ChildrenRetriever`] for children the first
//! time they are read, and again whenever the `refresh` period has elapsed.
//! Fetched pages are staged locally and only reconciled into the live child
//! list once the whole retrieval campaign succeeded.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdsdidl::DidlObject;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::container::Container;
use crate::entity::{CatalogEntity, EntityCore, EntityRef, Replaceable, SortingMethod};
use crate::error::{CatalogError, Result};

/// Arguments of one call to a [`ChildrenRetriever`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalRequest {
    /// Number of children already staged in this campaign
    pub offset: usize,
    /// Zero-based page number
    pub page: usize,
    /// Page size, for paged sources
    pub per_page: Option<usize>,
}

/// One batch of children, keyed by their backend id
#[derive(Debug, Default)]
pub struct RetrievedPage {
    pub children: Vec<(String, EntityRef)>,
    /// Ask for the next page
    pub has_more: bool,
}

impl RetrievedPage {
    pub fn last(children: Vec<(String, EntityRef)>) -> Self {
        Self {
            children,
            has_more: false,
        }
    }
}

/// Backend hook that fetches the children of a [`LazyContainer`]
#[async_trait]
pub trait ChildrenRetriever: Debug + Send + Sync {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievedPage>;
}

type RetrieveFn = dyn Fn(RetrievalRequest) -> BoxFuture<'static, Result<RetrievedPage>> + Send + Sync;

/// [`ChildrenRetriever`] built from a closure
pub struct FnRetriever {
    f: Box<RetrieveFn>,
}

impl FnRetriever {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(RetrievalRequest) -> BoxFuture<'static, Result<RetrievedPage>> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl Debug for FnRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnRetriever")
    }
}

#[async_trait]
impl ChildrenRetriever for FnRetriever {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievedPage> {
        (self.f)(request).await
    }
}

/// Tunables shared by the lazy containers of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazySettings {
    /// Refresh period, zero for never
    pub refresh: Duration,
    /// Upper bound for a whole campaign
    pub fetch_timeout: Duration,
    /// Maximum number of pages fetched by one campaign
    pub max_pages: usize,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self {
            refresh: Duration::ZERO,
            fetch_timeout: Duration::from_secs(30),
            max_pages: 100,
        }
    }
}

/// Population state of a lazy container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationState {
    Empty,
    Retrieving,
    Populated,
    Stale,
}

#[derive(Debug)]
struct Population {
    state: PopulationState,
    needs_retrieval: bool,
    last_updated: Option<Instant>,
    /// Completed campaigns, successful or not
    campaigns: u64,
}

/// Restores a consistent state when a campaign does not commit, including
/// when the future running it is dropped.
struct CampaignGuard<'a> {
    population: &'a Mutex<Population>,
    was_populated: bool,
    committed: bool,
}

impl CampaignGuard<'_> {
    fn commit(mut self) {
        let mut population = self.population.lock();
        population.state = PopulationState::Populated;
        population.needs_retrieval = false;
        population.last_updated = Some(Instant::now());
        population.campaigns += 1;
        self.committed = true;
    }
}

impl Drop for CampaignGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut population = self.population.lock();
        population.state = if self.was_populated {
            PopulationState::Stale
        } else {
            PopulationState::Empty
        };
        population.needs_retrieval = true;
        population.last_updated = Some(Instant::now());
        population.campaigns += 1;
    }
}

/// Container whose children come from a [`ChildrenRetriever`].
///
/// At most one retrieval campaign runs at a time; concurrent readers wait
/// for it and are then served from the reconciled children. A failed or
/// timed out campaign leaves the previous children untouched and the next
/// read tries again.
#[derive(Debug)]
pub struct LazyContainer {
    inner: Container,
    retriever: Arc<dyn ChildrenRetriever>,
    per_page: Option<usize>,
    settings: LazySettings,
    population: Mutex<Population>,
    campaign: tokio::sync::Mutex<()>,
}

impl LazyContainer {
    pub fn new(title: impl Into<String>, retriever: Arc<dyn ChildrenRetriever>) -> Self {
        Self {
            inner: Container::new(title),
            retriever,
            per_page: None,
            settings: LazySettings::default(),
            population: Mutex::new(Population {
                state: PopulationState::Empty,
                needs_retrieval: true,
                last_updated: None,
                campaigns: 0,
            }),
            campaign: tokio::sync::Mutex::new(()),
        }
    }

    /// Request pages of `per_page` children
    pub fn with_per_page(mut self, per_page: usize) -> Result<Self> {
        if per_page == 0 {
            return Err(CatalogError::Configuration(format!(
                "per_page must be positive for {}",
                self.inner.title()
            )));
        }
        self.per_page = Some(per_page);
        Ok(self)
    }

    pub fn with_settings(mut self, settings: LazySettings) -> Result<Self> {
        if settings.max_pages == 0 {
            return Err(CatalogError::Configuration(format!(
                "max_pages must be positive for {}",
                self.inner.title()
            )));
        }
        self.settings = settings;
        Ok(self)
    }

    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.settings.refresh = refresh;
        self
    }

    pub fn with_sorting(mut self, sorting_method: SortingMethod) -> Self {
        self.inner = self.inner.with_sorting(sorting_method);
        self
    }

    pub fn with_class(mut self, upnp_class: impl Into<String>) -> Self {
        self.inner = self.inner.with_class(upnp_class);
        self
    }

    /// Backend key of the container itself, compared by `replace_by`
    pub fn with_external_id(self, external_id: impl Into<String>) -> Self {
        self.inner.core().set_external_id(Some(external_id.into()));
        self
    }

    pub fn state(&self) -> PopulationState {
        self.population.lock().state
    }

    pub fn needs_retrieval(&self) -> bool {
        self.population.lock().needs_retrieval
    }

    pub fn last_updated(&self) -> Option<Instant> {
        self.population.lock().last_updated
    }

    /// Forces a retrieval on the next read
    pub fn invalidate(&self) {
        let mut population = self.population.lock();
        population.needs_retrieval = true;
        if population.state == PopulationState::Populated {
            population.state = PopulationState::Stale;
        }
    }

    pub fn container(&self) -> &Container {
        &self.inner
    }

    /// Marks the children stale once the refresh period has elapsed
    fn check_expiry(&self) {
        if self.settings.refresh.is_zero() {
            return;
        }
        let mut population = self.population.lock();
        let expired = population
            .last_updated
            .is_some_and(|at| at.elapsed() > self.settings.refresh);
        if expired && !population.needs_retrieval {
            info!(
                container = %self.inner.title(),
                refresh_secs = self.settings.refresh.as_secs(),
                "⏰ Last update is older than the refresh period"
            );
            population.needs_retrieval = true;
            population.state = PopulationState::Stale;
        }
    }

    /// Fetches pages until the source reports no more, into a local
    /// staging list
    async fn fetch_all(&self) -> Result<Vec<(String, EntityRef)>> {
        let mut staged: Vec<(String, EntityRef)> = Vec::new();
        let mut page = 0;

        loop {
            let request = RetrievalRequest {
                offset: staged.len(),
                page,
                per_page: self.per_page,
            };
            let batch = self.retriever.retrieve(request).await?;
            debug!(
                container = %self.inner.title(),
                page,
                fetched = batch.children.len(),
                "📥 Page retrieved"
            );
            staged.extend(batch.children);
            page += 1;

            if !batch.has_more {
                break;
            }
            if page >= self.settings.max_pages {
                warn!(
                    container = %self.inner.title(),
                    max_pages = self.settings.max_pages,
                    "Page limit reached, keeping what was fetched"
                );
                break;
            }
        }

        Ok(staged)
    }

    /// Runs a retrieval campaign unless another one completed while this
    /// caller was waiting.
    async fn run_campaign(&self) {
        let seen = self.population.lock().campaigns;
        let _running = self.campaign.lock().await;

        let guard = {
            let mut population = self.population.lock();
            if population.campaigns != seen || !population.needs_retrieval {
                return;
            }
            let was_populated = matches!(
                population.state,
                PopulationState::Populated | PopulationState::Stale
            );
            population.needs_retrieval = false;
            population.state = PopulationState::Retrieving;
            population.last_updated = Some(Instant::now());
            CampaignGuard {
                population: &self.population,
                was_populated,
                committed: false,
            }
        };

        debug!(container = %self.inner.title(), "🚚 Starting children retrieval");
        let outcome = match tokio::time::timeout(self.settings.fetch_timeout, self.fetch_all()).await {
            Ok(Ok(staged)) => self.inner.update_children(staged),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CatalogError::FetchTimeout(self.settings.fetch_timeout)),
        };

        match outcome {
            Ok(()) => {
                guard.commit();
                debug!(
                    container = %self.inner.title(),
                    children = self.inner.child_count(),
                    update_id = self.inner.current_update_id(),
                    "✅ Children retrieval done"
                );
            }
            Err(err) => {
                warn!(
                    container = %self.inner.title(),
                    error = %err,
                    "Children retrieval failed, serving cached children"
                );
            }
        }
    }

    async fn ensure_populated(&self) {
        self.check_expiry();
        let pending = {
            let population = self.population.lock();
            population.needs_retrieval || population.state == PopulationState::Retrieving
        };
        if pending {
            self.run_campaign().await;
        }
    }
}

#[async_trait]
impl CatalogEntity for LazyContainer {
    fn core(&self) -> &EntityCore {
        self.inner.core()
    }

    fn get_name(&self) -> String {
        self.inner.get_name()
    }

    fn mimetype(&self) -> String {
        self.inner.mimetype()
    }

    fn cover(&self) -> Option<String> {
        self.inner.cover()
    }

    async fn get_children(&self, start: usize, end: usize) -> Result<Vec<EntityRef>> {
        self.ensure_populated().await;
        Ok(self.inner.children_range(start, end))
    }

    async fn get_child_count(&self) -> Result<usize> {
        self.ensure_populated().await;
        Ok(self.inner.child_count())
    }

    async fn get_item(&self) -> Result<DidlObject> {
        self.inner.get_item().await
    }

    fn update_id(&self) -> Option<u32> {
        Some(self.inner.current_update_id())
    }

    fn as_replaceable(&self) -> Option<&dyn Replaceable> {
        Some(self)
    }

    fn as_container(&self) -> Option<&Container> {
        Some(&self.inner)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Replaceable for LazyContainer {
    /// Same backend key, or no key on either side: keep the existing
    /// container and its already fetched children.
    fn replace_by(&self, new: &dyn CatalogEntity) -> bool {
        match (self.core().external_id(), new.core().external_id()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        }
    }
}

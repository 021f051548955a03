//! The catalog store: id allocation, id lookup and the root container.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cdsconfig::Config;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::container::Container;
use crate::entity::{CatalogEntity, EntityRef, SortingMethod};
use crate::error::{CatalogError, Result};
use crate::lazy::{ChildrenRetriever, LazyContainer, LazySettings};
use crate::object_id::{ObjectId, ROOT_ID, SEED_ITEM_ID};
use crate::remap::{RemapTarget, default_table};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Store wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Prefix of item resource URLs, the id is appended to it
    pub urlbase: String,
    pub root_title: String,
    /// Sort key of containers created through the store
    pub sort_method: SortingMethod,
    pub lazy: LazySettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            urlbase: "http://localhost:8080/cds/".to_string(),
            root_title: "root".to_string(),
            sort_method: SortingMethod::Name,
            lazy: LazySettings::default(),
        }
    }
}

impl StoreSettings {
    pub fn with_urlbase(urlbase: impl Into<String>) -> Self {
        Self {
            urlbase: urlbase.into(),
            ..Default::default()
        }
    }

    /// Reads the `mediaserver`, `content_directory` and `lazy_container`
    /// sections.
    pub fn from_config(config: &Config) -> Result<Self> {
        let invalid = |e: anyhow::Error| CatalogError::Configuration(e.to_string());

        let fetch_timeout = config.get_lazy_fetch_timeout_secs().map_err(invalid)?;
        if fetch_timeout == 0 {
            return Err(CatalogError::Configuration(
                "lazy_container.fetch_timeout_secs must be positive".into(),
            ));
        }
        let max_pages = config.get_lazy_max_pages().map_err(invalid)?;
        if max_pages == 0 {
            return Err(CatalogError::Configuration(
                "lazy_container.max_pages must be positive".into(),
            ));
        }
        let sort_method = config
            .get_sort_method()
            .map_err(invalid)?
            .parse()
            .unwrap_or_default();

        Ok(Self {
            urlbase: config.get_urlbase().map_err(invalid)?,
            root_title: config.get_root_title().map_err(invalid)?,
            sort_method,
            lazy: LazySettings {
                refresh: Duration::from_secs(config.get_lazy_refresh_secs().map_err(invalid)? as u64),
                fetch_timeout: Duration::from_secs(fetch_timeout as u64),
                max_pages,
            },
        })
    }
}

/// Published whenever a container update counter moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerChange {
    pub container_id: u64,
    pub update_id: u32,
}

/// Maps numeric ids to live entities.
///
/// Ids are allocated from a counter seeded at [`SEED_ITEM_ID`] and never
/// reused. The root container holds the reserved id [`ROOT_ID`].
#[derive(Debug)]
pub struct Store {
    settings: StoreSettings,
    next_id: AtomicU64,
    entities: RwLock<HashMap<u64, EntityRef>>,
    root: RwLock<Option<EntityRef>>,
    wmc_mapping: RwLock<HashMap<String, RemapTarget>>,
    changes: broadcast::Sender<ContainerChange>,
    self_ref: Weak<Store>,
}

impl Store {
    /// Creates an empty store with the default compatibility table
    pub fn new(settings: StoreSettings) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new_cyclic(|weak| Store {
            settings,
            next_id: AtomicU64::new(SEED_ITEM_ID),
            entities: RwLock::new(HashMap::new()),
            root: RwLock::new(None),
            wmc_mapping: RwLock::new(default_table(weak.clone()).into_iter().collect()),
            changes,
            self_ref: weak.clone(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Arc<Self>> {
        Ok(Self::new(StoreSettings::from_config(config)?))
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn urlbase(&self) -> &str {
        &self.settings.urlbase
    }

    /// Allocates an id without registering anything
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Registers `item` under `storage_id`, or under a fresh id when `None`.
    ///
    /// Fails when a live entity already holds the forced id.
    pub fn append_item(&self, item: EntityRef, storage_id: Option<u64>) -> Result<u64> {
        let mut entities = self.entities.write();
        let id = match storage_id {
            Some(id) => {
                if entities.contains_key(&id) {
                    return Err(CatalogError::Configuration(format!(
                        "id {id} is already in use"
                    )));
                }
                // keep allocated ids above any forced one
                self.next_id.fetch_max(id.saturating_add(1).max(SEED_ITEM_ID), Ordering::SeqCst);
                id
            }
            None => self.next_id(),
        };

        item.core().bind(id, self.self_ref.clone());
        entities.insert(id, item);
        trace!(id, "🆔 Entity registered");
        Ok(id)
    }

    /// Registers `item` under a fresh id
    pub(crate) fn register(&self, item: EntityRef) -> u64 {
        let id = self.next_id();
        item.core().bind(id, self.self_ref.clone());
        self.entities.write().insert(id, item);
        trace!(id, "🆔 Entity registered");
        id
    }

    /// Unregisters one entity; its children, if any, stay registered
    pub fn remove_item(&self, item: &dyn CatalogEntity) {
        let Some(id) = item.get_id() else {
            return;
        };
        let target = std::ptr::from_ref(item).cast::<()>();
        let mut entities = self.entities.write();
        let same = entities
            .get(&id)
            .is_some_and(|e| Arc::as_ptr(e).cast::<()>() == target);
        if same {
            entities.remove(&id);
            trace!(id, "🗑️ Entity unregistered");
        }
        drop(entities);
        item.core().unbind();
    }

    /// Unregisters `item` and, for containers, all its descendants
    pub fn unregister_tree(&self, item: &EntityRef) {
        let mut pending = vec![item.clone()];
        while let Some(entity) = pending.pop() {
            if let Some(container) = entity.as_container() {
                pending.extend(container.children_snapshot());
            }
            self.remove_item(entity.as_ref());
        }
    }

    pub fn get(&self, id: u64) -> Option<EntityRef> {
        self.entities.read().get(&id).cloned()
    }

    /// Looks up a possibly decorated id (`1234`, `1234@56`, `1234.2`)
    pub fn get_by_id(&self, id: &str) -> Option<EntityRef> {
        ObjectId::parse_base(id).and_then(|base| self.get(base))
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Creates and registers the root container under id 0
    pub fn create_root(&self) -> Result<Arc<Container>> {
        let root = Arc::new(
            Container::root(self.settings.root_title.clone())
                .with_sorting(self.settings.sort_method.clone()),
        );
        self.set_root_item(root.clone())?;
        Ok(root)
    }

    /// Registers `root` under id 0
    pub fn set_root_item(&self, root: EntityRef) -> Result<()> {
        self.append_item(root.clone(), Some(ROOT_ID))?;
        root.core().set_parent(None);
        *self.root.write() = Some(root);
        debug!("🌳 Root container registered");
        Ok(())
    }

    pub fn get_root_item(&self) -> Option<EntityRef> {
        self.root.read().clone()
    }

    pub fn get_root_id(&self) -> Option<u64> {
        self.root.read().as_ref().and_then(|root| root.get_id())
    }

    /// A container using the store sorting method
    pub fn container(&self, title: impl Into<String>) -> Container {
        Container::new(title).with_sorting(self.settings.sort_method.clone())
    }

    /// A lazy container using the store sorting method and lazy settings
    pub fn lazy_container(
        &self,
        title: impl Into<String>,
        retriever: Arc<dyn ChildrenRetriever>,
    ) -> Result<LazyContainer> {
        LazyContainer::new(title, retriever)
            .with_sorting(self.settings.sort_method.clone())
            .with_settings(self.settings.lazy)
    }

    /// Compatibility target of `alias`, if any
    pub fn remap(&self, alias: &str) -> Option<RemapTarget> {
        self.wmc_mapping.read().get(alias).cloned()
    }

    pub fn set_remap(&self, alias: impl Into<String>, target: RemapTarget) {
        self.wmc_mapping.write().insert(alias.into(), target);
    }

    pub fn clear_remap(&self) {
        self.wmc_mapping.write().clear();
    }

    /// Restores the default compatibility table
    pub fn install_default_wmc_mapping(&self) {
        let mut mapping = self.wmc_mapping.write();
        mapping.clear();
        mapping.extend(default_table(self.self_ref.clone()));
    }

    /// Every non container entity reachable from `from`, depth first.
    ///
    /// Lazy containers met on the way are populated.
    pub async fn all_items(&self, from: u64) -> Vec<EntityRef> {
        let Some(start) = self.get(from) else {
            return Vec::new();
        };

        let mut items = Vec::new();
        let mut pending = vec![start];
        while let Some(entity) = pending.pop() {
            if !entity.is_container() {
                items.push(entity);
                continue;
            }
            match entity.get_children(0, 0).await {
                Ok(children) => pending.extend(children.into_iter().rev()),
                Err(err) => debug!(error = %err, "Skipping unreadable container"),
            }
        }
        items
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContainerChange> {
        self.changes.subscribe()
    }

    pub(crate) fn publish_change(&self, container_id: u64, update_id: u32) {
        trace!(container_id, update_id, "📣 Container changed");
        // no subscriber is fine
        let _ = self.changes.send(ContainerChange {
            container_id,
            update_id,
        });
    }
}

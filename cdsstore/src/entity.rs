//! The capability interface shared by every catalog entity.

use std::any::Any;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use cdsdidl::DidlObject;
use cdsdidl::upnp_class::is_container_mimetype;
use parking_lot::Mutex;

use crate::container::Container;
use crate::error::Result;
use crate::object_id::NO_PARENT;
use crate::store::Store;

/// Shared handle on a catalog entity
pub type EntityRef = Arc<dyn CatalogEntity>;

/// Store linkage of an entity
#[derive(Debug, Default)]
struct Link {
    storage_id: Option<u64>,
    parent_id: Option<u64>,
    external_id: Option<String>,
    store: Weak<Store>,
}

/// Identity and parent linkage, embedded in every entity.
///
/// The store fills it in when the entity is registered and clears it when
/// the entity is removed.
#[derive(Debug, Default)]
pub struct EntityCore {
    link: Mutex<Link>,
}

impl EntityCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id assigned by the store, `None` once removed or before registration
    pub fn storage_id(&self) -> Option<u64> {
        self.link.lock().storage_id
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.link.lock().parent_id
    }

    /// Parent id as announced in DIDL-Lite (`-1` for the root)
    pub fn parent_id_string(&self) -> String {
        self.parent_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| NO_PARENT.to_string())
    }

    /// Key of this entity in its backend, used by reconciliation
    pub fn external_id(&self) -> Option<String> {
        self.link.lock().external_id.clone()
    }

    pub fn store(&self) -> Option<Arc<Store>> {
        self.link.lock().store.upgrade()
    }

    /// Resource URL: the store urlbase followed by the id
    pub fn url(&self) -> Option<String> {
        let link = self.link.lock();
        let store = link.store.upgrade()?;
        let id = link.storage_id?;
        Some(format!("{}{}", store.urlbase(), id))
    }

    pub(crate) fn bind(&self, storage_id: u64, store: Weak<Store>) {
        let mut link = self.link.lock();
        link.storage_id = Some(storage_id);
        link.store = store;
    }

    pub(crate) fn unbind(&self) {
        let mut link = self.link.lock();
        link.storage_id = None;
        link.store = Weak::new();
    }

    pub(crate) fn set_parent(&self, parent_id: Option<u64>) {
        self.link.lock().parent_id = parent_id;
    }

    pub(crate) fn set_external_id(&self, external_id: Option<String>) {
        self.link.lock().external_id = external_id;
    }
}

/// Entities that can absorb a newer version of themselves during a
/// container refresh.
pub trait Replaceable {
    /// Returns `true` when `self` took over `new`, in which case `new` is
    /// dropped and `self` keeps its id. On `false` the container removes
    /// `self` and adds `new` instead.
    fn replace_by(&self, new: &dyn CatalogEntity) -> bool;
}

/// Main trait for catalog entities
///
/// Items and containers, whether static or backed by a remote source,
/// implement this trait. The Browse/Search engine only talks to entities
/// through it.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` for use in async servers.
#[async_trait]
pub trait CatalogEntity: Debug + Send + Sync {
    /// Store linkage of this entity
    fn core(&self) -> &EntityCore;

    /// Human readable name, also the default sort key
    fn get_name(&self) -> String;

    /// `"root"`, `"directory"` or a media MIME type
    fn mimetype(&self) -> String;

    fn location(&self) -> Option<String> {
        None
    }

    fn cover(&self) -> Option<String> {
        None
    }

    fn get_id(&self) -> Option<u64> {
        self.core().storage_id()
    }

    fn is_container(&self) -> bool {
        is_container_mimetype(&self.mimetype())
    }

    /// Children in `[start, end)`; `end == 0` means up to the last child
    async fn get_children(&self, _start: usize, _end: usize) -> Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }

    async fn get_child_count(&self) -> Result<usize> {
        Ok(0)
    }

    /// DIDL-Lite representation with the natural id and parent id
    async fn get_item(&self) -> Result<DidlObject>;

    /// Container update counter, `None` for items
    fn update_id(&self) -> Option<u32> {
        None
    }

    fn as_replaceable(&self) -> Option<&dyn Replaceable> {
        None
    }

    /// Static child list, if any
    fn as_container(&self) -> Option<&Container> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    /// Value of a sortable attribute
    fn sort_attribute(&self, attribute: &str) -> Option<String> {
        match attribute {
            "name" | "title" => Some(self.get_name()),
            "id" => self.get_id().map(|id| format!("{id:020}")),
            "mimetype" => Some(self.mimetype()),
            _ => None,
        }
    }
}

/// Key used to order the children of a container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortingMethod {
    #[default]
    Name,
    Id,
    Attribute(String),
}

impl SortingMethod {
    fn attribute(&self) -> &str {
        match self {
            SortingMethod::Name => "name",
            SortingMethod::Id => "id",
            SortingMethod::Attribute(attribute) => attribute,
        }
    }
}

impl FromStr for SortingMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "" | "name" | "title" => SortingMethod::Name,
            "id" => SortingMethod::Id,
            other => SortingMethod::Attribute(other.to_string()),
        })
    }
}

/// Stable sort of `children` by `method`.
///
/// Children lacking the attribute come first, in their current order.
pub fn sort_children(children: &mut [EntityRef], method: &SortingMethod) {
    let attribute = method.attribute();
    children.sort_by_cached_key(|child| child.sort_attribute(attribute));
}

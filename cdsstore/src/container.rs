//! Static containers: an ordered child list plus an update counter.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use cdsdidl::upnp_class::{MIMETYPE_DIRECTORY, MIMETYPE_ROOT, OBJECT_CONTAINER};
use cdsdidl::{AlbumArt, DidlObject};
use parking_lot::RwLock;
use tracing::debug;

use crate::entity::{CatalogEntity, EntityCore, EntityRef, SortingMethod, sort_children};
use crate::error::{CatalogError, Result};
use crate::store::Store;

#[derive(Debug, Default)]
struct ChildrenState {
    children: Vec<EntityRef>,
    by_external_id: HashMap<String, EntityRef>,
    sorted: bool,
}

/// A directory of the catalog.
///
/// Children are kept in insertion order and sorted lazily, once, on the
/// first read after a mutation.
#[derive(Debug)]
pub struct Container {
    core: EntityCore,
    title: String,
    mimetype: &'static str,
    upnp_class: String,
    cover: Option<String>,
    sorting_method: SortingMethod,
    state: RwLock<ChildrenState>,
    update_id: AtomicU32,
}

impl Container {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            core: EntityCore::new(),
            title: title.into(),
            mimetype: MIMETYPE_DIRECTORY,
            upnp_class: OBJECT_CONTAINER.to_string(),
            cover: None,
            sorting_method: SortingMethod::default(),
            state: RwLock::new(ChildrenState::default()),
            update_id: AtomicU32::new(0),
        }
    }

    /// Container meant to be registered at the root id
    pub fn root(title: impl Into<String>) -> Self {
        Self {
            mimetype: MIMETYPE_ROOT,
            ..Self::new(title)
        }
    }

    pub fn with_sorting(mut self, sorting_method: SortingMethod) -> Self {
        self.sorting_method = sorting_method;
        self
    }

    /// Announce a more specific class, e.g. `object.container.album.musicAlbum`
    pub fn with_class(mut self, upnp_class: impl Into<String>) -> Self {
        self.upnp_class = upnp_class.into();
        self
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sorting_method(&self) -> &SortingMethod {
        &self.sorting_method
    }

    fn attachment(&self) -> Result<(Arc<Store>, u64)> {
        let detached = || CatalogError::Detached(self.title.clone());
        let store = self.core.store().ok_or_else(detached)?;
        let id = self.core.storage_id().ok_or_else(detached)?;
        Ok((store, id))
    }

    /// Registers `child` (id assigned on first registration), links it to
    /// this container and appends it.
    fn attach(
        &self,
        state: &mut ChildrenState,
        store: &Arc<Store>,
        self_id: u64,
        child: EntityRef,
        external_id: Option<String>,
    ) -> u64 {
        let already_here = child
            .core()
            .store()
            .is_some_and(|s| Arc::ptr_eq(&s, store));
        let id = match child.get_id() {
            Some(id) if already_here => id,
            _ => store.register(child.clone()),
        };

        child.core().set_parent(Some(self_id));
        if let Some(external_id) = external_id {
            child.core().set_external_id(Some(external_id.clone()));
            state.by_external_id.insert(external_id, child.clone());
        }
        state.children.push(child);
        state.sorted = false;
        id
    }

    /// Unlinks `child` and unregisters it, with its subtree, from the store
    fn detach(&self, state: &mut ChildrenState, store: &Store, child: &EntityRef) -> bool {
        let Some(pos) = state.children.iter().position(|c| Arc::ptr_eq(c, child)) else {
            return false;
        };
        state.children.remove(pos);
        if let Some(external_id) = child.core().external_id() {
            if state
                .by_external_id
                .get(&external_id)
                .is_some_and(|c| Arc::ptr_eq(c, child))
            {
                state.by_external_id.remove(&external_id);
            }
            child.core().set_external_id(None);
        }
        store.unregister_tree(child);
        state.sorted = false;
        true
    }

    /// Adds a child, registering it in the store when it is new.
    ///
    /// Returns the child id. Fails with `Detached` when this container is
    /// not registered itself.
    pub fn add_child(
        &self,
        child: EntityRef,
        external_id: Option<String>,
        update: bool,
    ) -> Result<u64> {
        let (store, self_id) = self.attachment()?;
        let id = {
            let mut state = self.state.write();
            self.attach(&mut state, &store, self_id, child, external_id)
        };
        if update {
            self.bump_update_id();
        }
        debug!(container_id = self_id, child_id = id, "➕ Child added");
        Ok(id)
    }

    /// Removes a child and unregisters it (and its descendants) from the store
    pub fn remove_child(&self, child: &EntityRef, update: bool) -> Result<()> {
        let (store, self_id) = self.attachment()?;
        let removed = {
            let mut state = self.state.write();
            self.detach(&mut state, &store, child)
        };
        if !removed {
            return Err(CatalogError::NotFound(format!(
                "{} in container {self_id}",
                child.get_name()
            )));
        }
        if update {
            self.bump_update_id();
        }
        debug!(container_id = self_id, "➖ Child removed");
        Ok(())
    }

    /// Three-way refresh of the children against `new_children`, keyed by
    /// external id.
    ///
    /// Children missing from `new_children` are removed, new keys are added
    /// and shared keys are offered to `replace_by`; a declined (or
    /// impossible) replacement removes the old child and adds the new one.
    /// The whole refresh bumps the update counter once.
    pub fn update_children(&self, new_children: Vec<(String, EntityRef)>) -> Result<()> {
        let (store, self_id) = self.attachment()?;

        // Last occurrence of a key wins, first-seen order is kept
        let mut order: Vec<String> = Vec::new();
        let mut incoming: HashMap<String, EntityRef> = HashMap::new();
        for (external_id, child) in new_children {
            if incoming.insert(external_id.clone(), child).is_none() {
                order.push(external_id);
            }
        }

        {
            let mut state = self.state.write();
            let old_children = state.by_external_id.clone();

            let to_remove: Vec<(String, EntityRef)> = old_children
                .iter()
                .filter(|(key, _)| !incoming.contains_key(*key))
                .map(|(key, child)| (key.clone(), child.clone()))
                .collect();
            let (to_replace, to_add): (Vec<String>, Vec<String>) = order
                .into_iter()
                .partition(|key| old_children.contains_key(key));

            debug!(
                container_id = self_id,
                removed = to_remove.len(),
                replaced = to_replace.len(),
                added = to_add.len(),
                "🔄 Reconciling children"
            );

            for (_, old) in &to_remove {
                self.detach(&mut state, &store, old);
            }

            for key in to_replace {
                let (Some(old), Some(new)) = (old_children.get(&key), incoming.remove(&key))
                else {
                    continue;
                };
                let replaced = old
                    .as_replaceable()
                    .is_some_and(|r| r.replace_by(new.as_ref()));
                if replaced {
                    // sort keys may have changed in place
                    state.sorted = false;
                } else {
                    self.detach(&mut state, &store, old);
                    self.attach(&mut state, &store, self_id, new, Some(key));
                }
            }

            for key in to_add {
                if let Some(new) = incoming.remove(&key) {
                    self.attach(&mut state, &store, self_id, new, Some(key));
                }
            }
        }

        self.bump_update_id();
        Ok(())
    }

    /// Children in `[start, end)` after sorting; `end == 0` means to the end
    pub fn children_range(&self, start: usize, end: usize) -> Vec<EntityRef> {
        {
            let mut state = self.state.write();
            if !state.sorted {
                sort_children(&mut state.children, &self.sorting_method);
                state.sorted = true;
            }
        }

        let state = self.state.read();
        let len = state.children.len();
        let end = if end == 0 { len } else { end.min(len) };
        if start >= end {
            return Vec::new();
        }
        state.children[start..end].to_vec()
    }

    /// Children in their current order, without sorting
    pub fn children_snapshot(&self) -> Vec<EntityRef> {
        self.state.read().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.state.read().children.len()
    }

    pub fn children_by_external_id(&self) -> HashMap<String, EntityRef> {
        self.state.read().by_external_id.clone()
    }

    pub fn is_sorted(&self) -> bool {
        self.state.read().sorted
    }

    pub fn current_update_id(&self) -> u32 {
        self.update_id.load(Ordering::SeqCst)
    }

    /// Increments the update counter and publishes the change
    pub(crate) fn bump_update_id(&self) -> u32 {
        let update_id = self.update_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        if let (Some(store), Some(id)) = (self.core.store(), self.core.storage_id()) {
            store.publish_change(id, update_id);
        }
        update_id
    }

    pub(crate) fn didl(&self) -> Result<cdsdidl::Container> {
        let id = self
            .core
            .storage_id()
            .ok_or_else(|| CatalogError::Detached(self.title.clone()))?;
        Ok(cdsdidl::Container {
            id: id.to_string(),
            parent_id: self.core.parent_id_string(),
            title: self.title.clone(),
            class: self.upnp_class.clone(),
            child_count: Some(self.child_count().to_string()),
            album_art: self.cover.clone().map(AlbumArt::new),
            ..Default::default()
        })
    }
}

#[async_trait]
impl CatalogEntity for Container {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn get_name(&self) -> String {
        self.title.clone()
    }

    fn mimetype(&self) -> String {
        self.mimetype.to_string()
    }

    fn cover(&self) -> Option<String> {
        self.cover.clone()
    }

    async fn get_children(&self, start: usize, end: usize) -> Result<Vec<EntityRef>> {
        Ok(self.children_range(start, end))
    }

    async fn get_child_count(&self) -> Result<usize> {
        Ok(self.child_count())
    }

    async fn get_item(&self) -> Result<DidlObject> {
        Ok(DidlObject::Container(self.didl()?))
    }

    fn update_id(&self) -> Option<u32> {
        Some(self.current_update_id())
    }

    fn as_container(&self) -> Option<&Container> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::MediaItem;
    use crate::store::{Store, StoreSettings};

    fn setup() -> (Arc<Store>, Arc<Container>) {
        let store = Store::new(StoreSettings::default());
        let root = store.create_root().unwrap();
        (store, root)
    }

    fn leaf(name: &str) -> EntityRef {
        Arc::new(MediaItem::new(name, "audio/mpeg"))
    }

    #[test]
    fn test_add_child_links_and_bumps() {
        let (store, root) = setup();
        let child = leaf("a");
        let id = root.add_child(child.clone(), Some("ext-a".into()), true).unwrap();

        assert_eq!(child.get_id(), Some(id));
        assert_eq!(child.core().parent_id(), Some(0));
        assert_eq!(root.current_update_id(), 1);
        assert!(store.get_by_id(&id.to_string()).is_some());
        assert!(root.children_by_external_id().contains_key("ext-a"));
        assert!(!root.is_sorted());
    }

    #[test]
    fn test_update_false_keeps_counter() {
        let (_store, root) = setup();
        root.add_child(leaf("a"), None, false).unwrap();
        assert_eq!(root.current_update_id(), 0);
    }

    #[test]
    fn test_n_mutations_bump_n_times() {
        let (_store, root) = setup();
        let children: Vec<EntityRef> = (0..5).map(|i| leaf(&format!("c{i}"))).collect();
        for child in &children {
            root.add_child(child.clone(), None, true).unwrap();
        }
        root.remove_child(&children[0], true).unwrap();
        root.remove_child(&children[1], true).unwrap();
        assert_eq!(root.current_update_id(), 7);
    }

    #[test]
    fn test_remove_child_unregisters() {
        let (store, root) = setup();
        let child = leaf("a");
        let id = root.add_child(child.clone(), Some("ext".into()), true).unwrap();
        root.remove_child(&child, true).unwrap();

        assert!(store.get_by_id(&id.to_string()).is_none());
        assert_eq!(child.get_id(), None);
        assert!(child.core().external_id().is_none());
        assert!(root.children_by_external_id().is_empty());
        assert_eq!(root.child_count(), 0);

        assert!(matches!(
            root.remove_child(&child, true),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_container_unregisters_subtree() {
        let (store, root) = setup();
        let folder = Arc::new(Container::new("folder"));
        let folder_id = root.add_child(folder.clone(), None, true).unwrap();
        let nested = Arc::new(Container::new("nested"));
        let nested_id = folder.add_child(nested.clone(), None, true).unwrap();
        let deep_id = nested.add_child(leaf("deep"), None, true).unwrap();

        let folder_ref: EntityRef = folder.clone();
        root.remove_child(&folder_ref, true).unwrap();
        for id in [folder_id, nested_id, deep_id] {
            assert!(store.get_by_id(&id.to_string()).is_none());
        }
    }

    #[test]
    fn test_detached_container_refuses_children() {
        let folder = Container::new("orphan");
        assert!(matches!(
            folder.add_child(leaf("a"), None, true),
            Err(CatalogError::Detached(_))
        ));
    }

    #[test]
    fn test_pagination() {
        let (_store, root) = setup();
        for i in 0..10 {
            root.add_child(leaf(&format!("child{i:02}")), None, true).unwrap();
        }

        let page = root.children_range(2, 5);
        let names: Vec<String> = page.iter().map(|c| c.get_name()).collect();
        assert_eq!(names, vec!["child02", "child03", "child04"]);

        let tail = root.children_range(8, 0);
        let names: Vec<String> = tail.iter().map(|c| c.get_name()).collect();
        assert_eq!(names, vec!["child08", "child09"]);

        assert!(root.children_range(12, 0).is_empty());
        assert_eq!(root.children_range(7, 50).len(), 3);
    }

    #[test]
    fn test_sort_on_read() {
        let (_store, root) = setup();
        for name in ["delta", "alpha", "charlie", "bravo"] {
            root.add_child(leaf(name), None, true).unwrap();
        }
        assert!(!root.is_sorted());

        let first: Vec<String> = root.children_range(0, 0).iter().map(|c| c.get_name()).collect();
        assert!(root.is_sorted());
        let second: Vec<String> = root.children_range(0, 0).iter().map(|c| c.get_name()).collect();
        assert_eq!(first, vec!["alpha", "bravo", "charlie", "delta"]);
        assert_eq!(first, second);

        root.add_child(leaf("aardvark"), None, true).unwrap();
        assert!(!root.is_sorted());
        assert_eq!(root.children_range(0, 1)[0].get_name(), "aardvark");
    }

    #[test]
    fn test_reconciliation() {
        let (store, root) = setup();
        let a = leaf("a1");
        let b = leaf("b2");
        let c = leaf("c3");
        root.add_child(a.clone(), Some("a".into()), false).unwrap();
        root.add_child(b.clone(), Some("b".into()), false).unwrap();
        root.add_child(c.clone(), Some("c".into()), false).unwrap();
        let a_id = a.get_id().unwrap();
        let b_id = b.get_id().unwrap();
        let before = root.current_update_id();

        let b_prime = leaf("b2-prime");
        let c_again = leaf("c3");
        let d = leaf("d4");
        root.update_children(vec![
            ("b".into(), b_prime),
            ("c".into(), c_again),
            ("d".into(), d.clone()),
        ])
        .unwrap();

        assert_eq!(root.current_update_id(), before + 1);
        let names: Vec<String> = root.children_range(0, 0).iter().map(|c| c.get_name()).collect();
        assert_eq!(names, vec!["b2-prime", "c3", "d4"]);

        // a is gone, b took the new metadata in place, d is new
        assert!(store.get_by_id(&a_id.to_string()).is_none());
        assert_eq!(b.get_id(), Some(b_id));
        assert_eq!(b.get_name(), "b2-prime");
        assert_eq!(d.core().parent_id(), Some(0));

        let keys = root.children_by_external_id();
        let mut keys: Vec<&String> = keys.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_reconciliation_without_replace_by() {
        let (store, root) = setup();
        let old = Arc::new(Container::new("old folder"));
        root.add_child(old.clone(), Some("k".into()), false).unwrap();
        let old_id = old.get_id().unwrap();

        let new = Arc::new(Container::new("new folder"));
        root.update_children(vec![("k".into(), new.clone() as EntityRef)])
            .unwrap();

        assert!(store.get_by_id(&old_id.to_string()).is_none());
        let new_id = new.get_id().unwrap();
        assert!(new_id > old_id);
        assert_eq!(root.children_range(0, 0)[0].get_name(), "new folder");
        assert_eq!(root.current_update_id(), 1);
    }

    #[test]
    fn test_replacement_in_place_resorts() {
        let (_store, root) = setup();
        root.add_child(leaf("alpha"), Some("a".into()), false).unwrap();
        root.add_child(leaf("bravo"), Some("b".into()), false).unwrap();
        let names = |c: &Container| -> Vec<String> {
            c.children_range(0, 0).iter().map(|c| c.get_name()).collect()
        };
        assert_eq!(names(&root), vec!["alpha", "bravo"]);

        root.update_children(vec![("a".into(), leaf("zulu")), ("b".into(), leaf("bravo"))])
            .unwrap();
        assert!(!root.is_sorted());
        assert_eq!(names(&root), vec!["bravo", "zulu"]);
    }

    #[test]
    fn test_update_id_wraps() {
        let (_store, root) = setup();
        root.update_id.store(u32::MAX, Ordering::SeqCst);
        root.add_child(leaf("a"), None, true).unwrap();
        assert_eq!(root.current_update_id(), 0);
    }
}

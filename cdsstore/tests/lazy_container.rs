use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cdsstore::{
    CatalogEntity, CatalogError, ChildrenRetriever, EntityRef, FnRetriever, LazyContainer,
    LazySettings, MediaItem, PopulationState, RetrievalRequest, RetrievedPage, Store,
    StoreSettings,
};
use futures::FutureExt;
use parking_lot::Mutex;

/// Source de test : une liste de titres servie par pages
#[derive(Debug, Default)]
struct ScriptedSource {
    titles: Mutex<Vec<String>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RetrievalRequest>>,
    delay: Duration,
    failing: AtomicBool,
    always_more: bool,
}

impl ScriptedSource {
    fn with_titles(titles: &[&str]) -> Self {
        Self {
            titles: Mutex::new(titles.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    fn set_titles(&self, titles: &[&str]) {
        *self.titles.lock() = titles.iter().map(|t| t.to_string()).collect();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChildrenRetriever for ScriptedSource {
    async fn retrieve(&self, request: RetrievalRequest) -> cdsstore::Result<RetrievedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::FetchFailed("backend down".into()));
        }

        let titles = self.titles.lock().clone();
        let (slice, has_more) = match request.per_page {
            Some(per_page) => {
                let start = request.offset.min(titles.len());
                let end = (start + per_page).min(titles.len());
                (titles[start..end].to_vec(), end < titles.len() || self.always_more)
            }
            None => (titles, false),
        };

        Ok(RetrievedPage {
            children: slice
                .into_iter()
                .map(|t| {
                    let item: EntityRef = Arc::new(MediaItem::new(t.clone(), "audio/flac"));
                    (t, item)
                })
                .collect(),
            has_more,
        })
    }
}

fn attach(source: Arc<ScriptedSource>, settings: LazySettings) -> (Arc<Store>, Arc<LazyContainer>) {
    let store = Store::new(StoreSettings::default());
    let root = store.create_root().unwrap();
    let lazy = Arc::new(
        LazyContainer::new("remote", source)
            .with_settings(settings)
            .unwrap(),
    );
    root.add_child(lazy.clone(), Some("remote".into()), true).unwrap();
    (store, lazy)
}

fn titles(children: &[EntityRef]) -> Vec<String> {
    children.iter().map(|c| c.get_name()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_share_one_campaign() {
    let source = Arc::new(ScriptedSource {
        delay: Duration::from_secs(2),
        ..ScriptedSource::with_titles(&["b", "a"])
    });
    let (_store, lazy) = attach(source.clone(), LazySettings::default());

    let (first, second) = tokio::join!(lazy.get_children(0, 0), lazy.get_children(0, 0));

    assert_eq!(titles(&first.unwrap()), vec!["a", "b"]);
    assert_eq!(titles(&second.unwrap()), vec!["a", "b"]);
    assert_eq!(source.calls(), 1);
    assert_eq!(lazy.update_id(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_period() {
    let source = Arc::new(ScriptedSource::with_titles(&["a"]));
    let settings = LazySettings {
        refresh: Duration::from_secs(60),
        ..Default::default()
    };
    let (_store, lazy) = attach(source.clone(), settings);

    lazy.get_children(0, 0).await.unwrap();
    assert_eq!(source.calls(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    lazy.get_children(0, 0).await.unwrap();
    assert_eq!(source.calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    source.set_titles(&["a", "b"]);
    let children = lazy.get_children(0, 0).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(titles(&children), vec!["a", "b"]);
    assert_eq!(lazy.state(), PopulationState::Populated);
}

#[tokio::test(start_paused = true)]
async fn test_zero_refresh_never_expires() {
    let source = Arc::new(ScriptedSource::with_titles(&["a"]));
    let (_store, lazy) = attach(source.clone(), LazySettings::default());

    lazy.get_children(0, 0).await.unwrap();
    tokio::time::advance(Duration::from_secs(24 * 3600)).await;
    lazy.get_children(0, 0).await.unwrap();
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_failure_serves_cached_children_and_retries() {
    let source = Arc::new(ScriptedSource::with_titles(&["a", "b"]));
    let (_store, lazy) = attach(source.clone(), LazySettings::default());

    assert_eq!(lazy.get_children(0, 0).await.unwrap().len(), 2);

    source.failing.store(true, Ordering::SeqCst);
    source.set_titles(&["c"]);
    lazy.invalidate();
    let children = lazy.get_children(0, 0).await.unwrap();
    assert_eq!(titles(&children), vec!["a", "b"]);
    assert_eq!(lazy.state(), PopulationState::Stale);
    assert!(lazy.needs_retrieval());
    assert_eq!(lazy.update_id(), Some(1));

    source.failing.store(false, Ordering::SeqCst);
    let children = lazy.get_children(0, 0).await.unwrap();
    assert_eq!(titles(&children), vec!["c"]);
    assert_eq!(lazy.update_id(), Some(2));
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_failure_with_nothing_cached_is_empty() {
    let source = Arc::new(ScriptedSource::with_titles(&["a"]));
    source.failing.store(true, Ordering::SeqCst);
    let (_store, lazy) = attach(source.clone(), LazySettings::default());

    assert!(lazy.get_children(0, 0).await.unwrap().is_empty());
    assert_eq!(lazy.get_child_count().await.unwrap(), 0);
    assert_eq!(lazy.state(), PopulationState::Empty);
    assert_eq!(lazy.update_id(), Some(0));
}

#[tokio::test]
async fn test_paged_source() {
    let source = Arc::new(ScriptedSource::with_titles(&["t1", "t2", "t3", "t4", "t5"]));
    let store = Store::new(StoreSettings::default());
    let root = store.create_root().unwrap();
    let lazy = Arc::new(
        LazyContainer::new("paged", source.clone())
            .with_per_page(2)
            .unwrap(),
    );
    root.add_child(lazy.clone(), None, true).unwrap();

    let children = lazy.get_children(0, 0).await.unwrap();
    assert_eq!(titles(&children), vec!["t1", "t2", "t3", "t4", "t5"]);

    let requests = source.requests.lock().clone();
    let pages: Vec<(usize, usize)> = requests.iter().map(|r| (r.page, r.offset)).collect();
    assert_eq!(pages, vec![(0, 0), (1, 2), (2, 4)]);
    // One refresh, one bump
    assert_eq!(lazy.update_id(), Some(1));
}

#[tokio::test]
async fn test_page_limit() {
    let source = Arc::new(ScriptedSource {
        always_more: true,
        ..ScriptedSource::with_titles(&["t1", "t2", "t3", "t4", "t5"])
    });
    let store = Store::new(StoreSettings::default());
    let root = store.create_root().unwrap();
    let lazy = Arc::new(
        LazyContainer::new("endless", source.clone())
            .with_per_page(1)
            .unwrap()
            .with_settings(LazySettings {
                max_pages: 3,
                ..Default::default()
            })
            .unwrap(),
    );
    root.add_child(lazy.clone(), None, true).unwrap();

    assert_eq!(lazy.get_children(0, 0).await.unwrap().len(), 3);
    assert_eq!(source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_previous_state() {
    let source = Arc::new(ScriptedSource {
        delay: Duration::from_secs(60),
        ..ScriptedSource::with_titles(&["a"])
    });
    let settings = LazySettings {
        fetch_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (_store, lazy) = attach(source.clone(), settings);

    assert!(lazy.get_children(0, 0).await.unwrap().is_empty());
    assert_eq!(lazy.state(), PopulationState::Empty);
    assert!(lazy.needs_retrieval());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_campaign_releases_guard() {
    let source = Arc::new(ScriptedSource {
        delay: Duration::from_secs(10),
        ..ScriptedSource::with_titles(&["a"])
    });
    let (_store, lazy) = attach(source.clone(), LazySettings::default());

    let reader = lazy.clone();
    let handle = tokio::spawn(async move { reader.get_children(0, 0).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(lazy.state(), PopulationState::Retrieving);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert_eq!(lazy.state(), PopulationState::Empty);
    assert!(lazy.needs_retrieval());

    // The next reader runs a new campaign
    assert_eq!(lazy.get_children(0, 0).await.unwrap().len(), 1);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_refresh_keeps_ids_of_replaced_children() {
    let source = Arc::new(ScriptedSource::with_titles(&["a", "b", "c"]));
    let (store, lazy) = attach(source.clone(), LazySettings::default());

    let before = lazy.get_children(0, 0).await.unwrap();
    let id_of = |children: &[EntityRef], name: &str| {
        children
            .iter()
            .find(|c| c.get_name() == name)
            .and_then(|c| c.get_id())
    };
    let a_id = id_of(&before, "a").unwrap();
    let b_id = id_of(&before, "b").unwrap();

    source.set_titles(&["b", "c", "d"]);
    lazy.invalidate();
    let after = lazy.get_children(0, 0).await.unwrap();

    assert_eq!(titles(&after), vec!["b", "c", "d"]);
    assert_eq!(id_of(&after, "b"), Some(b_id));
    assert!(store.get(a_id).is_none());
    assert_eq!(lazy.update_id(), Some(2));
}

#[tokio::test]
async fn test_detached_lazy_container_does_not_populate() {
    let source = Arc::new(ScriptedSource::with_titles(&["a"]));
    let lazy = LazyContainer::new("orphan", source.clone());

    assert!(lazy.get_children(0, 0).await.unwrap().is_empty());
    assert!(lazy.needs_retrieval());
}

#[tokio::test]
async fn test_refresh_renaming_a_child_resorts() {
    // (clé externe, titre)
    let listing = Arc::new(Mutex::new(vec![("k1", "alpha"), ("k2", "bravo")]));
    let shared = listing.clone();
    let retriever = FnRetriever::new(move |_request| {
        let listing = shared.lock().clone();
        async move {
            let children = listing
                .into_iter()
                .map(|(key, title)| {
                    let item: EntityRef = Arc::new(MediaItem::new(title, "audio/flac"));
                    (key.to_string(), item)
                })
                .collect();
            Ok::<_, CatalogError>(RetrievedPage::last(children))
        }
        .boxed()
    });
    let store = Store::new(StoreSettings::default());
    let root = store.create_root().unwrap();
    let lazy = Arc::new(LazyContainer::new("remote", Arc::new(retriever)));
    root.add_child(lazy.clone(), None, true).unwrap();

    let before = lazy.get_children(0, 0).await.unwrap();
    assert_eq!(titles(&before), vec!["alpha", "bravo"]);
    let renamed_id = before[0].get_id();

    *listing.lock() = vec![("k1", "zulu"), ("k2", "bravo")];
    lazy.invalidate();
    let after = lazy.get_children(0, 0).await.unwrap();

    assert_eq!(titles(&after), vec!["bravo", "zulu"]);
    assert_eq!(after[1].get_id(), renamed_id);
    assert_eq!(titles(&lazy.get_children(1, 2).await.unwrap()), vec!["zulu"]);
}

//! # cdsstore
//!
//! The catalog behind a UPnP ContentDirectory: entities, the store that
//! hands out their ids, static containers and containers populated on
//! demand from a remote source.
//!
//! ## Features
//!
//! - **Entity model**: every object implements [`CatalogEntity`]; items and
//!   containers are served through trait objects ([`EntityRef`]).
//! - **Store**: monotonic ids seeded at 1000, root at 0, lenient lookup of
//!   decorated ids (`1234@56`, `1234.2`).
//! - **Containers**: sort on read, update counters, three-way refresh keyed
//!   by backend ids.
//! - **Lazy containers**: single-flight retrieval campaigns with refresh
//!   period, paging and timeout.
//! - **Change tracking**: every update counter move is published on a
//!   broadcast channel ([`Store::subscribe`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cdsstore::{MediaItem, Store, StoreSettings};
//!
//! let store = Store::new(StoreSettings::default());
//! let root = store.create_root()?;
//! let album = Arc::new(store.container("Kind of Blue"));
//! root.add_child(album.clone(), None, true)?;
//! album.add_child(Arc::new(MediaItem::new("So What", "audio/mpeg")), None, true)?;
//! ```

pub mod container;
pub mod entity;
pub mod error;
pub mod item;
pub mod lazy;
pub mod object_id;
pub mod remap;
pub mod store;

pub use container::Container;
pub use entity::{CatalogEntity, EntityCore, EntityRef, Replaceable, SortingMethod, sort_children};
pub use error::{CatalogError, Result};
pub use item::{MediaItem, MediaMetadata};
pub use lazy::{
    ChildrenRetriever, FnRetriever, LazyContainer, LazySettings, PopulationState,
    RetrievalRequest, RetrievedPage,
};
pub use object_id::{NO_PARENT, ObjectId, ROOT_ID, SEED_ITEM_ID};
pub use remap::RemapTarget;
pub use store::{ContainerChange, Store, StoreSettings};

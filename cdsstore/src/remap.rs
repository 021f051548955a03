//! Client compatibility ids.
//!
//! Some control points (Windows Media Connect and the Xbox family) browse
//! fixed, well-known ids instead of the ones announced by the server. The
//! store keeps a table translating those ids either to a real id or to a
//! function producing a synthetic flat list.

use std::fmt;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::entity::EntityRef;
use crate::object_id::ROOT_ID;
use crate::store::Store;

type FlattenFn = dyn Fn() -> BoxFuture<'static, Vec<EntityRef>> + Send + Sync;

/// What a compatibility id stands for
#[derive(Clone)]
pub enum RemapTarget {
    /// Browse this real id instead
    RealId(u64),
    /// Serve the list returned by the function
    Flattener(Arc<FlattenFn>),
}

impl RemapTarget {
    pub fn flattener<F>(f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Vec<EntityRef>> + Send + Sync + 'static,
    {
        RemapTarget::Flattener(Arc::new(f))
    }
}

impl fmt::Debug for RemapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemapTarget::RealId(id) => f.debug_tuple("RealId").field(id).finish(),
            RemapTarget::Flattener(_) => f.write_str("Flattener"),
        }
    }
}

/// WMC ids standing for "every item": all music, all videos, all pictures
pub const WMC_FLAT_IDS: [&str; 3] = ["4", "8", "B"];

/// WMC ids served as regular ids
pub const WMC_PASSTHROUGH_IDS: [u64; 11] = [5, 6, 7, 9, 10, 11, 13, 14, 15, 16, 17];

/// Default table: flat views over every leaf below the root, plus
/// passthrough entries for the numeric WMC ids.
pub(crate) fn default_table(store: Weak<Store>) -> Vec<(String, RemapTarget)> {
    let mut table = Vec::with_capacity(WMC_FLAT_IDS.len() + WMC_PASSTHROUGH_IDS.len());

    for alias in WMC_FLAT_IDS {
        let store = store.clone();
        let target = RemapTarget::flattener(move || {
            let store = store.clone();
            async move {
                match store.upgrade() {
                    Some(store) => store.all_items(ROOT_ID).await,
                    None => Vec::new(),
                }
            }
            .boxed()
        });
        table.push((alias.to_string(), target));
    }

    for id in WMC_PASSTHROUGH_IDS {
        table.push((id.to_string(), RemapTarget::RealId(id)));
    }

    table
}

//! Construit un petit catalogue et affiche les réponses Browse.
//!
//! ```bash
//! cargo run -p cdsmediaserver --example browse_tree
//! ```

use std::sync::Arc;

use cdsconfig::Config;
use cdsdidl::ClientProfile;
use cdsmediaserver::logs::init_logging;
use cdsmediaserver::{BrowseRequest, ContentDirectory};
use cdsstore::{CatalogError, EntityRef, FnRetriever, MediaItem, RetrievedPage, Store};
use futures::FutureExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::defaults()?;
    init_logging(&config);

    let store = Store::from_config(&config)?;
    let root = store.create_root()?;

    let albums = Arc::new(store.container("Albums"));
    root.add_child(albums.clone(), None, true)?;
    for title in ["Kind of Blue", "Blue Train"] {
        albums.add_child(Arc::new(MediaItem::new(title, "audio/flac")), None, true)?;
    }

    // Radio simulée : deux pages de résultats
    let retriever = FnRetriever::new(|request| {
        async move {
            let children: Vec<(String, EntityRef)> = (0..3)
                .map(|n| {
                    let key = format!("station-{}-{n}", request.page);
                    let item: EntityRef =
                        Arc::new(MediaItem::new(format!("Station {key}"), "audio/mpeg"));
                    (key, item)
                })
                .collect();
            Ok::<_, CatalogError>(RetrievedPage {
                children,
                has_more: request.page == 0,
            })
        }
        .boxed()
    });
    let radios = Arc::new(store.lazy_container("Radios", Arc::new(retriever))?.with_per_page(3)?);
    root.add_child(radios, None, true)?;

    let cd = ContentDirectory::from_config(store, &config)?;
    let _tracking = cd.spawn_update_tracking();

    for request in [
        BrowseRequest::metadata("0"),
        BrowseRequest::children("0"),
        BrowseRequest::children("1003").with_range(0, 4),
        BrowseRequest::children("4").with_client(ClientProfile::XBox),
    ] {
        let response = cd.browse(&request).await?;
        println!(
            "== {} {} -> {}/{} (UpdateID {})",
            request.browse_flag,
            request.object_id,
            response.number_returned,
            response.total_matches,
            response.update_id
        );
        println!("{}\n", response.result);
    }

    Ok(())
}

//! # ContentDirectory Service - Moteur Browse/Search
//!
//! Ce module implémente la logique du service ContentDirectory:1 au-dessus
//! d'un [`Store`] : résolution des identifiants (y compris la table de
//! compatibilité Windows Media Connect), pagination, rendu DIDL-Lite et
//! suivi des `UpdateID`.
//!
//! ## Actions
//!
//! - ✅ Browse
//! - ✅ Search (critère accepté, tous les enfants correspondent)
//! - ✅ GetSearchCapabilities
//! - ✅ GetSortCapabilities
//! - ✅ GetSystemUpdateID
//!
//! ## Exemple
//!
//! ```rust,ignore
//! use cdsmediaserver::contentdirectory::{BrowseRequest, ContentDirectory};
//!
//! let cd = ContentDirectory::new(store);
//! let response = cd.browse(&BrowseRequest::children("0")).await?;
//! println!("{} / {}", response.number_returned, response.total_matches);
//! ```

pub mod actions;
pub mod browse;
pub mod handlers;
pub mod search;
pub mod state;

use std::sync::Arc;

use cdsconfig::Config;
use cdsdidl::upnp_class::OBJECT_CONTAINER;
use cdsdidl::{ClientProfile, DidlWriter, RenderContext};
use cdsstore::{EntityRef, ObjectId, ROOT_ID, RemapTarget, Store};
use futures::future::join_all;
use tracing::{debug, info, warn};

pub use browse::{BrowseFlag, BrowseRequest, BrowseResponse};
pub use search::SearchRequest;
pub use state::{EventedVariables, UpdateTracker};

use crate::errors::{ContentDirectoryError, Result};

pub const DEFAULT_SEARCH_CAPABILITIES: &str = "dc:title,upnp:class";
pub const DEFAULT_SORT_CAPABILITIES: &str = "dc:title";

/// Objet visé par une requête, une fois les alias résolus
enum Resolved {
    /// Entité du store ; `rendered_as` est l'identifiant utilisé pour le
    /// rendu DIDL-Lite
    Entity {
        entity: EntityRef,
        rendered_as: String,
    },
    /// Vue à plat produite par la table de compatibilité
    Flat(Vec<EntityRef>),
    /// Alias vers un identifiant absent du store
    Missing,
}

/// Moteur du service ContentDirectory
#[derive(Debug)]
pub struct ContentDirectory {
    store: Arc<Store>,
    tracker: Arc<UpdateTracker>,
    search_capabilities: String,
    sort_capabilities: String,
    remap_all_clients: bool,
    root_title: String,
}

impl ContentDirectory {
    pub fn new(store: Arc<Store>) -> Self {
        let tracker = Arc::new(UpdateTracker::new(&store));
        let root_title = store.settings().root_title.clone();
        Self {
            store,
            tracker,
            search_capabilities: DEFAULT_SEARCH_CAPABILITIES.to_string(),
            sort_capabilities: DEFAULT_SORT_CAPABILITIES.to_string(),
            remap_all_clients: false,
            root_title,
        }
    }

    /// Lit la section `content_directory` et `mediaserver.root_title`
    pub fn from_config(store: Arc<Store>, config: &Config) -> Result<Self> {
        let invalid = |e: anyhow::Error| ContentDirectoryError::CannotProcess(e.to_string());
        Ok(Self {
            search_capabilities: config.get_search_capabilities().map_err(invalid)?,
            sort_capabilities: config.get_sort_capabilities().map_err(invalid)?,
            remap_all_clients: config.get_remap_all_clients().map_err(invalid)?,
            root_title: config.get_root_title().map_err(invalid)?,
            ..Self::new(store)
        })
    }

    /// Applique la table de compatibilité à tous les clients, pas
    /// seulement à la Xbox
    pub fn with_remap_all_clients(mut self, remap_all_clients: bool) -> Self {
        self.remap_all_clients = remap_all_clients;
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<UpdateTracker> {
        &self.tracker
    }

    pub fn search_capabilities(&self) -> &str {
        &self.search_capabilities
    }

    pub fn sort_capabilities(&self) -> &str {
        &self.sort_capabilities
    }

    pub fn system_update_id(&self) -> u32 {
        self.tracker.system_update_id()
    }

    /// Démarre la consommation des changements du store en tâche de fond
    pub fn spawn_update_tracking(&self) -> tokio::task::JoinHandle<()> {
        let tracker = self.tracker.clone();
        tokio::spawn(async move { tracker.run().await })
    }

    fn remaps_for(&self, client: ClientProfile) -> bool {
        self.remap_all_clients || client == ClientProfile::XBox
    }

    fn render_context(&self, context: RenderContext) -> RenderContext {
        context.with_root_title(self.root_title.clone())
    }

    async fn resolve(&self, object_id: &str, client: ClientProfile) -> Result<Resolved> {
        let target = if self.remaps_for(client) {
            self.store.remap(object_id)
        } else {
            None
        };
        if let Some(target) = target {
            debug!(object_id, ?target, client = %client, "🔁 Compatibility id");
            return Ok(match target {
                RemapTarget::RealId(id) => match self.store.get(id) {
                    Some(entity) => Resolved::Entity {
                        entity,
                        rendered_as: ObjectId::new(id).to_string(),
                    },
                    None => Resolved::Missing,
                },
                RemapTarget::Flattener(flatten) => Resolved::Flat(flatten().await),
            });
        }

        match self.store.get_by_id(object_id) {
            Some(entity) => Ok(Resolved::Entity {
                entity,
                rendered_as: object_id.to_string(),
            }),
            None => Err(ContentDirectoryError::NoSuchObject(object_id.to_string())),
        }
    }

    /// Action Browse
    pub async fn browse(&self, request: &BrowseRequest) -> Result<BrowseResponse> {
        info!(
            object_id = %request.object_id,
            browse_flag = %request.browse_flag,
            starting_index = request.starting_index,
            requested_count = request.requested_count,
            client = %request.client,
            "📂 Browse request"
        );

        let response = match self.resolve(&request.object_id, request.client).await? {
            Resolved::Entity {
                entity,
                rendered_as,
            } => match request.browse_flag {
                BrowseFlag::BrowseMetadata => {
                    self.metadata(&entity, &rendered_as, request.client).await?
                }
                BrowseFlag::BrowseDirectChildren => {
                    self.children(
                        &entity,
                        &rendered_as,
                        request.client,
                        request.starting_index,
                        request.requested_count,
                    )
                    .await?
                }
            },
            Resolved::Flat(entities) => match request.browse_flag {
                BrowseFlag::BrowseMetadata => {
                    self.flat_view_metadata(&request.object_id, entities.len(), request.client)?
                }
                BrowseFlag::BrowseDirectChildren => {
                    self.flat_view(
                        entities,
                        &request.object_id,
                        request.client,
                        request.starting_index,
                        request.requested_count,
                    )
                    .await?
                }
            },
            Resolved::Missing => self.empty(request.client)?,
        };

        debug!(
            returned = response.number_returned,
            total = response.total_matches,
            update_id = response.update_id,
            "✅ Browse completed"
        );
        Ok(response)
    }

    /// Action Search : tous les enfants du container correspondent
    pub async fn search(&self, request: &SearchRequest) -> Result<BrowseResponse> {
        info!(
            container_id = %request.container_id,
            search_criteria = %request.search_criteria,
            starting_index = request.starting_index,
            requested_count = request.requested_count,
            client = %request.client,
            "🔍 Search request"
        );

        let response = match self.resolve(&request.container_id, request.client).await? {
            Resolved::Entity {
                entity,
                rendered_as,
            } => {
                self.children(
                    &entity,
                    &rendered_as,
                    request.client,
                    request.starting_index,
                    request.requested_count,
                )
                .await?
            }
            Resolved::Flat(entities) => {
                self.flat_view(
                    entities,
                    &request.container_id,
                    request.client,
                    request.starting_index,
                    request.requested_count,
                )
                .await?
            }
            Resolved::Missing => self.empty(request.client)?,
        };

        debug!(
            returned = response.number_returned,
            total = response.total_matches,
            "✅ Search completed"
        );
        Ok(response)
    }

    fn update_id_of(&self, entity: Option<&EntityRef>) -> u32 {
        entity
            .and_then(|e| e.update_id())
            .unwrap_or_else(|| self.system_update_id())
    }

    async fn metadata(
        &self,
        entity: &EntityRef,
        rendered_as: &str,
        client: ClientProfile,
    ) -> Result<BrowseResponse> {
        let object = entity.get_item().await?;
        let context = self.render_context(RenderContext::metadata(client, rendered_as));
        let mut writer = DidlWriter::new(context);
        writer.add_object(object);

        Ok(BrowseResponse {
            result: writer.to_xml()?,
            number_returned: 1,
            total_matches: 1,
            update_id: self.update_id_of(Some(entity)),
        })
    }

    async fn children(
        &self,
        entity: &EntityRef,
        rendered_as: &str,
        client: ClientProfile,
        starting_index: u32,
        requested_count: u32,
    ) -> Result<BrowseResponse> {
        let start = starting_index as usize;
        let end = match requested_count {
            0 => 0,
            count => start.saturating_add(count as usize),
        };

        let children = entity.get_children(start, end).await?;
        let total = entity.get_child_count().await?;

        let context = self.render_context(RenderContext::children(client, rendered_as));
        let writer = render_objects(context, &children).await;

        Ok(BrowseResponse {
            result: writer.to_xml()?,
            number_returned: count_u32(writer.num_items()),
            total_matches: count_u32(total),
            update_id: self.update_id_of(Some(entity)),
        })
    }

    async fn flat_view(
        &self,
        entities: Vec<EntityRef>,
        alias: &str,
        client: ClientProfile,
        starting_index: u32,
        requested_count: u32,
    ) -> Result<BrowseResponse> {
        let total = entities.len();
        let start = (starting_index as usize).min(total);
        let end = match requested_count {
            0 => total,
            count => start.saturating_add(count as usize).min(total),
        };

        let context = self.render_context(RenderContext::children(client, alias));
        let writer = render_objects(context, &entities[start..end]).await;

        Ok(BrowseResponse {
            result: writer.to_xml()?,
            number_returned: count_u32(writer.num_items()),
            total_matches: count_u32(total),
            update_id: self.update_id_of(None),
        })
    }

    /// Container synthétique décrivant une vue à plat
    fn flat_view_metadata(
        &self,
        alias: &str,
        child_count: usize,
        client: ClientProfile,
    ) -> Result<BrowseResponse> {
        let container = cdsdidl::Container {
            id: alias.to_string(),
            parent_id: ROOT_ID.to_string(),
            title: alias.to_string(),
            class: OBJECT_CONTAINER.to_string(),
            child_count: Some(child_count.to_string()),
            ..Default::default()
        };
        let context = self.render_context(RenderContext::metadata(client, alias));
        let mut writer = DidlWriter::new(context);
        writer.add_object(container);

        Ok(BrowseResponse {
            result: writer.to_xml()?,
            number_returned: 1,
            total_matches: 1,
            update_id: self.update_id_of(None),
        })
    }

    fn empty(&self, client: ClientProfile) -> Result<BrowseResponse> {
        let writer = DidlWriter::new(self.render_context(RenderContext {
            client,
            ..Default::default()
        }));
        Ok(BrowseResponse {
            result: writer.to_xml()?,
            number_returned: 0,
            total_matches: 0,
            update_id: self.update_id_of(None),
        })
    }
}

/// Convertit les entités en DIDL-Lite en parallèle ; l'ordre du document
/// suit l'ordre des entités. Une entité dont la conversion échoue est
/// omise.
async fn render_objects(context: RenderContext, entities: &[EntityRef]) -> DidlWriter {
    let objects = join_all(entities.iter().map(|entity| entity.get_item())).await;

    let mut writer = DidlWriter::new(context);
    for (entity, object) in entities.iter().zip(objects) {
        match object {
            Ok(object) => writer.add_object(object),
            Err(err) => warn!(
                name = %entity.get_name(),
                error = %err,
                "Skipping object that cannot be rendered"
            ),
        }
    }
    writer
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

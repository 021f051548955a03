//! # Handlers pour les actions ContentDirectory
//!
//! Chaque handler fait le pont entre les arguments SOAP (déjà extraits de
//! l'enveloppe, sous forme de chaînes) et le moteur [`ContentDirectory`].
//! Les sorties sont renvoyées sous forme de paires `(nom, valeur)` dans
//! l'ordre du SCPD.
//!
//! ```text
//! UPnP Action (XML)
//!       ↓
//! Handler (ce module) - extraction et validation des paramètres
//!       ↓
//! ContentDirectory - logique métier
//!       ↓
//! Store / containers
//! ```

use std::collections::HashMap;

use tracing::{debug, error};

use crate::contentdirectory::ContentDirectory;
use crate::contentdirectory::actions::find_action;
use crate::contentdirectory::browse::BrowseRequest;
use crate::contentdirectory::search::SearchRequest;
use crate::errors::{ContentDirectoryError, Result};

/// Arguments de sortie d'une action
pub type ActionOutput = Vec<(&'static str, String)>;

/// Handler pour l'action Browse.
///
/// # Arguments UPnP
///
/// - `ObjectID` : ID de l'objet à parcourir (à défaut `ContainerID`, puis "0")
/// - `BrowseFlag` : "BrowseMetadata" ou "BrowseDirectChildren"
/// - `Filter` : Filtre de propriétés (non utilisé)
/// - `StartingIndex` : Index de départ pour la pagination
/// - `RequestedCount` : Nombre d'éléments demandés (0 = tous)
/// - `SortCriteria` : Critères de tri (non utilisé)
///
/// # Retours UPnP
///
/// - `Result` : XML DIDL-Lite contenant les résultats
/// - `NumberReturned` : Nombre d'éléments retournés
/// - `TotalMatches` : Nombre total d'éléments
/// - `UpdateID` : ID de mise à jour
pub async fn browse_handler(
    content_directory: &ContentDirectory,
    arguments: &HashMap<String, String>,
) -> Result<ActionOutput> {
    debug!("📂 Browse handler called");

    let request = BrowseRequest::from_arguments(arguments)?;
    let response = content_directory.browse(&request).await.map_err(|e| {
        error!("Browse failed: {}", e);
        e
    })?;

    debug!(
        "✅ Browse completed: returned={}, total={}",
        response.number_returned, response.total_matches
    );
    Ok(response.output_arguments())
}

/// Handler pour l'action Search.
///
/// Mêmes retours que Browse ; `SearchCriteria` est accepté tel quel.
pub async fn search_handler(
    content_directory: &ContentDirectory,
    arguments: &HashMap<String, String>,
) -> Result<ActionOutput> {
    debug!("🔍 Search handler called");

    let request = SearchRequest::from_arguments(arguments)?;
    let response = content_directory.search(&request).await.map_err(|e| {
        error!("Search failed: {}", e);
        e
    })?;

    debug!(
        "✅ Search completed: returned={}, total={}",
        response.number_returned, response.total_matches
    );
    Ok(response.output_arguments())
}

/// Handler pour GetSearchCapabilities (`SearchCaps`)
pub fn get_search_capabilities_handler(content_directory: &ContentDirectory) -> ActionOutput {
    debug!("🔍 GetSearchCapabilities handler called");
    let capabilities = content_directory.search_capabilities().to_string();
    debug!("✅ SearchCapabilities: {}", capabilities);
    vec![("SearchCaps", capabilities)]
}

/// Handler pour GetSortCapabilities (`SortCaps`)
pub fn get_sort_capabilities_handler(content_directory: &ContentDirectory) -> ActionOutput {
    debug!("📊 GetSortCapabilities handler called");
    let capabilities = content_directory.sort_capabilities().to_string();
    debug!("✅ SortCapabilities: {}", capabilities);
    vec![("SortCaps", capabilities)]
}

/// Handler pour GetSystemUpdateID (`Id`)
pub fn get_system_update_id_handler(content_directory: &ContentDirectory) -> ActionOutput {
    debug!("🔄 GetSystemUpdateID handler called");
    let update_id = content_directory.system_update_id();
    debug!("✅ SystemUpdateID: {}", update_id);
    vec![("Id", update_id.to_string())]
}

/// Aiguille une action par son nom
pub async fn dispatch(
    content_directory: &ContentDirectory,
    action: &str,
    arguments: &HashMap<String, String>,
) -> Result<ActionOutput> {
    let descriptor = find_action(action)
        .ok_or_else(|| ContentDirectoryError::InvalidAction(action.to_string()))?;

    match descriptor.name {
        "Browse" => browse_handler(content_directory, arguments).await,
        "Search" => search_handler(content_directory, arguments).await,
        "GetSearchCapabilities" => Ok(get_search_capabilities_handler(content_directory)),
        "GetSortCapabilities" => Ok(get_sort_capabilities_handler(content_directory)),
        "GetSystemUpdateID" => Ok(get_system_update_id_handler(content_directory)),
        other => Err(ContentDirectoryError::InvalidAction(other.to_string())),
    }
}

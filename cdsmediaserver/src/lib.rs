//! Service ContentDirectory d'un MediaServer UPnP/DLNA.
//!
//! Ce crate assemble le catalogue ([`cdsstore`]) et le rendu DIDL-Lite
//! ([`cdsdidl`]) pour répondre aux actions du service ContentDirectory:1.
//! Les couches réseau (SSDP, SOAP, GENA, HTTP) ne sont pas incluses : elles
//! appellent les handlers avec des arguments déjà extraits.
//!
//! # Architecture
//!
//! - [`contentdirectory::ContentDirectory`] : moteur Browse/Search
//! - [`contentdirectory::handlers`] : liaison des arguments SOAP
//! - [`contentdirectory::UpdateTracker`] : `SystemUpdateID` et
//!   `ContainerUpdateIDs`
//! - [`logs`] : initialisation de `tracing`
//!
//! # Utilisation de base
//!
//! ```ignore
//! use cdsconfig::get_config;
//! use cdsmediaserver::{ContentDirectory, logs::init_logging};
//! use cdsstore::Store;
//!
//! let config = get_config();
//! init_logging(&config);
//!
//! let store = Store::from_config(&config)?;
//! let root = store.create_root()?;
//! // ... peupler le catalogue
//!
//! let cd = ContentDirectory::from_config(store, &config)?;
//! let _tracking = cd.spawn_update_tracking();
//! ```

pub mod contentdirectory;
pub mod errors;
pub mod logs;

pub use contentdirectory::{
    BrowseFlag, BrowseRequest, BrowseResponse, ContentDirectory, EventedVariables, SearchRequest,
    UpdateTracker,
};
pub use errors::ContentDirectoryError;

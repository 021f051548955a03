//! # cdsdidl - modèle DIDL-Lite
//!
//! Lecture (via `quick-xml` + serde) et écriture (via `xmltree`) des documents
//! DIDL-Lite échangés par un ContentDirectory UPnP/DLNA, ainsi que les
//! règles propres aux clients (Xbox, TV Philips, PS3) et la gestion des
//! `protocolInfo`.

pub mod client;
pub mod error;
pub mod protocol;
pub mod render;
pub mod upnp_class;

pub use client::ClientProfile;
pub use error::{DidlError, Result};
pub use protocol::{ProtocolInfo, build_dlna_additional_info, sort_resources};
pub use render::{DidlWriter, RenderContext};

use serde::{Deserialize, Serialize};

pub const DIDL_NAMESPACE: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
pub const UPNP_NAMESPACE: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";
pub const DLNA_NAMESPACE: &str = "urn:schemas-dlna-org:metadata-1-0";

// ============= Couche d'abstraction générique =============

/// Trait pour tout parser de métadonnées média
pub trait MediaMetadataParser: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse une chaîne de métadonnées
    fn parse(input: &str) -> std::result::Result<Self, Self::Error>;
}

impl MediaMetadataParser for DIDLLite {
    type Error = DidlError;

    fn parse(input: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(input)?)
    }
}

// ============= Structures DIDL-Lite =============

/// Racine d'un document DIDL-Lite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DIDLLite {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "@xmlns:upnp", skip_serializing_if = "Option::is_none")]
    pub xmlns_upnp: Option<String>,

    #[serde(rename = "@xmlns:dc", skip_serializing_if = "Option::is_none")]
    pub xmlns_dc: Option<String>,

    #[serde(rename = "@xmlns:dlna", skip_serializing_if = "Option::is_none")]
    pub xmlns_dlna: Option<String>,

    #[serde(rename = "container", default)]
    pub containers: Vec<Container>,

    #[serde(rename = "item", default)]
    pub items: Vec<Item>,
}

/// Container DIDL (répertoire, album, dossier de stockage…)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@refID", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "@childCount", skip_serializing_if = "Option::is_none")]
    pub child_count: Option<String>,

    #[serde(rename = "@searchable", skip_serializing_if = "Option::is_none")]
    pub searchable: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(
        rename = "dc:creator",
        alias = "creator",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator: Option<String>,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:genre",
        alias = "genre",
        skip_serializing_if = "Option::is_none"
    )]
    pub genre: Option<String>,

    #[serde(
        rename = "upnp:albumArtURI",
        alias = "albumArtURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<AlbumArt>,

    #[serde(rename = "upnp:searchClass", alias = "searchClass", default)]
    pub search_classes: Vec<SearchClass>,

    #[serde(rename = "res", default)]
    pub resources: Vec<Resource>,
}

/// Item DIDL (piste, vidéo, photo…)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@refID", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(
        rename = "dc:creator",
        alias = "creator",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator: Option<String>,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:album",
        alias = "album",
        skip_serializing_if = "Option::is_none"
    )]
    pub album: Option<String>,

    #[serde(
        rename = "upnp:genre",
        alias = "genre",
        skip_serializing_if = "Option::is_none"
    )]
    pub genre: Option<String>,

    #[serde(
        rename = "upnp:albumArtURI",
        alias = "albumArtURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<AlbumArt>,

    #[serde(
        rename = "dc:date",
        alias = "date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,

    #[serde(
        rename = "upnp:originalTrackNumber",
        alias = "originalTrackNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_track_number: Option<String>,

    #[serde(
        rename = "dc:description",
        alias = "description",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(
        rename = "upnp:longDescription",
        alias = "longDescription",
        skip_serializing_if = "Option::is_none"
    )]
    pub long_description: Option<String>,

    #[serde(rename = "res", default)]
    pub resources: Vec<Resource>,

    #[serde(rename = "desc", default)]
    pub descriptions: Vec<Description>,
}

/// Pochette, avec le profil DLNA éventuel (`JPEG_TN`, `PNG_TN`…)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumArt {
    #[serde(
        rename = "@dlna:profileID",
        alias = "@profileID",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_id: Option<String>,

    #[serde(rename = "$text")]
    pub uri: String,
}

impl AlbumArt {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            profile_id: None,
            uri: uri.into(),
        }
    }
}

/// Classe recherchable annoncée par un container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchClass {
    #[serde(rename = "@includeDerived", skip_serializing_if = "Option::is_none")]
    pub include_derived: Option<String>,

    #[serde(rename = "$text")]
    pub class: String,
}

/// Ressource média
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "@protocolInfo")]
    pub protocol_info: String,

    #[serde(rename = "@size", skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(rename = "@duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(rename = "@bitrate", skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,

    #[serde(rename = "@bitsPerSample", skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<String>,

    #[serde(rename = "@sampleFrequency", skip_serializing_if = "Option::is_none")]
    pub sample_frequency: Option<String>,

    #[serde(rename = "@nrAudioChannels", skip_serializing_if = "Option::is_none")]
    pub nr_audio_channels: Option<String>,

    #[serde(rename = "@resolution", skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(rename = "@importUri", skip_serializing_if = "Option::is_none")]
    pub import_uri: Option<String>,

    #[serde(rename = "$text")]
    pub url: String,
}

impl Resource {
    pub fn new(url: impl Into<String>, protocol_info: impl Into<String>) -> Self {
        Self {
            protocol_info: protocol_info.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Le `protocolInfo` décodé, s'il est bien formé
    pub fn protocol(&self) -> Option<ProtocolInfo> {
        self.protocol_info.parse().ok()
    }
}

/// Élément `<desc>` : métadonnées propres à un fournisseur
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "@nameSpace", skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(rename = "$text", default)]
    pub content: String,
}

/// Objet DIDL à sérialiser : un container ou un item
#[derive(Debug, Clone, PartialEq)]
pub enum DidlObject {
    Container(Container),
    Item(Item),
}

impl DidlObject {
    pub fn id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.id,
            DidlObject::Item(i) => &i.id,
        }
    }

    pub fn parent_id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.parent_id,
            DidlObject::Item(i) => &i.parent_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.title,
            DidlObject::Item(i) => &i.title,
        }
    }

    pub fn class(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.class,
            DidlObject::Item(i) => &i.class,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DidlObject::Container(_))
    }
}

impl From<Container> for DidlObject {
    fn from(c: Container) -> Self {
        DidlObject::Container(c)
    }
}

impl From<Item> for DidlObject {
    fn from(i: Item) -> Self {
        DidlObject::Item(i)
    }
}

// ============= Implémentation des méthodes =============

impl DIDLLite {
    /// Parse un document DIDL-Lite
    pub fn parse(input: &str) -> Result<Self> {
        <Self as MediaMetadataParser>::parse(input)
    }

    /// Trouve un container par ID
    pub fn get_container_by_id(&self, id: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.id == id)
    }

    /// Trouve un item par ID
    pub fn get_item_by_id(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Nombre total d'objets (containers + items)
    pub fn len(&self) -> usize {
        self.containers.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

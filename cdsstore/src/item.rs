//! Leaf entities: tracks, pictures, videos.

use std::any::Any;

use async_trait::async_trait;
use cdsdidl::upnp_class::{OBJECT_ITEM, class_for_mimetype};
use cdsdidl::{AlbumArt, DidlObject, Item, ProtocolInfo, Resource};
use parking_lot::RwLock;

use crate::entity::{CatalogEntity, EntityCore, Replaceable};
use crate::error::{CatalogError, Result};

/// Descriptive metadata of a media item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaMetadata {
    pub title: String,
    pub mimetype: String,
    /// Where the backend finds the media (path or remote URL)
    pub location: Option<String>,
    pub cover: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub track_number: Option<u32>,
    /// `H:MM:SS` duration
    pub duration: Option<String>,
    pub size: Option<u64>,
    pub description: Option<String>,
    /// Announce audio as `musicTrack` rather than `audioItem`
    pub music: bool,
}

/// A leaf of the catalog, served over HTTP at `urlbase + id`
#[derive(Debug)]
pub struct MediaItem {
    core: EntityCore,
    metadata: RwLock<MediaMetadata>,
}

impl MediaItem {
    pub fn new(title: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self::with_metadata(MediaMetadata {
            title: title.into(),
            mimetype: mimetype.into(),
            ..Default::default()
        })
    }

    pub fn with_metadata(metadata: MediaMetadata) -> Self {
        Self {
            core: EntityCore::new(),
            metadata: RwLock::new(metadata),
        }
    }

    pub fn metadata(&self) -> MediaMetadata {
        self.metadata.read().clone()
    }

    fn to_didl(&self) -> Result<Item> {
        let id = self
            .core
            .storage_id()
            .ok_or_else(|| CatalogError::Detached(self.metadata.read().title.clone()))?;
        let meta = self.metadata.read();

        let class = class_for_mimetype(&meta.mimetype, meta.music).unwrap_or(OBJECT_ITEM);
        let mut item = Item {
            id: id.to_string(),
            parent_id: self.core.parent_id_string(),
            title: meta.title.clone(),
            class: class.to_string(),
            artist: meta.artist.clone(),
            creator: meta.artist.clone(),
            album: meta.album.clone(),
            genre: meta.genre.clone(),
            date: meta.date.clone(),
            original_track_number: meta.track_number.map(|n| n.to_string()),
            description: meta.description.clone(),
            album_art: meta.cover.clone().map(AlbumArt::new),
            ..Default::default()
        };

        if let Some(url) = self.core.url() {
            let protocol_info = ProtocolInfo::http_get(meta.mimetype.clone()).normalized();
            let mut resource = Resource::new(url, protocol_info.to_string());
            resource.duration = meta.duration.clone();
            resource.size = meta.size.map(|s| s.to_string());
            item.resources.push(resource);
        }

        Ok(item)
    }
}

#[async_trait]
impl CatalogEntity for MediaItem {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn get_name(&self) -> String {
        self.metadata.read().title.clone()
    }

    fn mimetype(&self) -> String {
        self.metadata.read().mimetype.clone()
    }

    fn location(&self) -> Option<String> {
        self.metadata.read().location.clone()
    }

    fn cover(&self) -> Option<String> {
        self.metadata.read().cover.clone()
    }

    async fn get_item(&self) -> Result<DidlObject> {
        Ok(DidlObject::Item(self.to_didl()?))
    }

    fn as_replaceable(&self) -> Option<&dyn Replaceable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn sort_attribute(&self, attribute: &str) -> Option<String> {
        let meta = self.metadata.read();
        match attribute {
            "name" | "title" => Some(meta.title.clone()),
            "artist" => meta.artist.clone(),
            "album" => meta.album.clone(),
            "genre" => meta.genre.clone(),
            "date" => meta.date.clone(),
            "track" | "track_number" => meta.track_number.map(|n| format!("{n:06}")),
            "mimetype" => Some(meta.mimetype.clone()),
            "id" => self.core.storage_id().map(|id| format!("{id:020}")),
            _ => None,
        }
    }
}

impl Replaceable for MediaItem {
    /// Takes over the metadata of another `MediaItem`; refuses anything else.
    fn replace_by(&self, new: &dyn CatalogEntity) -> bool {
        match new.as_any().downcast_ref::<MediaItem>() {
            Some(other) => {
                let fresh = other.metadata();
                *self.metadata.write() = fresh;
                true
            }
            None => false,
        }
    }
}

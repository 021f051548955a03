//! Choix de la classe `upnp:class` à partir du type d'une entité

pub const OBJECT_ITEM: &str = "object.item";
pub const OBJECT_CONTAINER: &str = "object.container";
pub const STORAGE_FOLDER: &str = "object.container.storageFolder";
pub const MUSIC_ALBUM: &str = "object.container.album.musicAlbum";
pub const AUDIO_ITEM: &str = "object.item.audioItem";
pub const MUSIC_TRACK: &str = "object.item.audioItem.musicTrack";
pub const PHOTO: &str = "object.item.imageItem.photo";
pub const VIDEO_ITEM: &str = "object.item.videoItem";

/// Pseudo-types des entités qui ne sont pas des médias
pub const MIMETYPE_ROOT: &str = "root";
pub const MIMETYPE_DIRECTORY: &str = "directory";
pub const MIMETYPE_ITEM: &str = "item";

/// Classe UPnP d'une entité selon son type MIME.
///
/// `music` sélectionne les classes musicales (`musicAlbum`, `musicTrack`).
/// Retourne `None` pour un type inconnu.
pub fn class_for_mimetype(mimetype: &str, music: bool) -> Option<&'static str> {
    match mimetype {
        MIMETYPE_ROOT => Some(OBJECT_CONTAINER),
        MIMETYPE_ITEM => Some(OBJECT_ITEM),
        MIMETYPE_DIRECTORY if music => Some(MUSIC_ALBUM),
        MIMETYPE_DIRECTORY => Some(OBJECT_CONTAINER),
        m if m.starts_with("image/") => Some(PHOTO),
        m if m.starts_with("audio/") || m == "application/ogg" || m == "application/x-flac" => {
            Some(if music { MUSIC_TRACK } else { AUDIO_ITEM })
        }
        m if m.starts_with("video/") => Some(VIDEO_ITEM),
        _ => None,
    }
}

/// Vrai si le type désigne un container
pub fn is_container_mimetype(mimetype: &str) -> bool {
    mimetype == MIMETYPE_ROOT || mimetype == MIMETYPE_DIRECTORY
}

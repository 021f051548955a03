//! Écriture des documents DIDL-Lite
//!
//! Le [`DidlWriter`] accumule des objets dans l'ordre d'ajout et produit le
//! document final. Le [`RenderContext`] porte ce qui dépend de la requête :
//! le client, l'identifiant demandé (BrowseMetadata) ou le container
//! parcouru (BrowseDirectChildren). Ces deux derniers pilotent la réécriture
//! des identifiants `id@container`.

use tracing::info;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::client::ClientProfile;
use crate::error::Result;
use crate::protocol::{ProtocolInfo, sort_resources};
use crate::upnp_class::{OBJECT_CONTAINER, STORAGE_FOLDER};
use crate::{
    AlbumArt, Container, DC_NAMESPACE, DIDL_NAMESPACE, DLNA_NAMESPACE, Description, DidlObject,
    Item, Resource, SearchClass, UPNP_NAMESPACE,
};

/// Containers WMC sous lesquels la Xbox attend des `storageFolder`
const XBOX_FOLDER_PARENTS: [&str; 3] = ["14", "15", "16"];

/// Paramètres de rendu propres à une requête
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub client: ClientProfile,
    /// Identifiant demandé par un BrowseMetadata
    pub requested_id: Option<String>,
    /// Container parcouru par un BrowseDirectChildren ou un Search
    pub parent_container: Option<String>,
    /// Titre annoncé pour l'objet `0`
    pub root_title: String,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            client: ClientProfile::Generic,
            requested_id: None,
            parent_container: None,
            root_title: "root".to_string(),
        }
    }
}

impl RenderContext {
    pub fn metadata(client: ClientProfile, requested_id: impl Into<String>) -> Self {
        Self {
            client,
            requested_id: Some(requested_id.into()),
            ..Default::default()
        }
    }

    pub fn children(client: ClientProfile, parent_container: impl Into<String>) -> Self {
        Self {
            client,
            parent_container: Some(parent_container.into()),
            ..Default::default()
        }
    }

    pub fn with_root_title(mut self, root_title: impl Into<String>) -> Self {
        self.root_title = root_title.into();
        self
    }
}

/// Identité d'un objet telle qu'elle est annoncée au client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedIdentity {
    pub id: String,
    pub parent_id: String,
    pub ref_id: Option<String>,
    pub title: Option<String>,
}

/// Réécrit `id`, `parentID` et `refID` selon le contexte de la requête.
///
/// - BrowseMetadata sur un identifiant différent de l'identifiant naturel :
///   l'objet prend l'identifiant demandé, `parentID` devient la partie qui
///   suit `@`, et `refID` pointe sur l'identifiant naturel.
/// - BrowseDirectChildren à travers un container qui n'est ni `0` ni le
///   parent naturel : l'objet devient `id@container`.
///
/// La Xbox ne reçoit jamais de `refID`.
pub fn rewrite_identity(
    context: &RenderContext,
    id: &str,
    parent_id: &str,
    ref_id: Option<&str>,
) -> RenderedIdentity {
    let shows_ref = context.client.shows_ref_id();
    let mut out = RenderedIdentity {
        id: id.to_string(),
        parent_id: parent_id.to_string(),
        ref_id: ref_id.filter(|_| shows_ref).map(str::to_string),
        title: None,
    };

    if let Some(requested) = context.requested_id.as_deref().filter(|r| !r.is_empty()) {
        if requested == "0" {
            out.title = Some(context.root_title.clone());
        }
        if requested != id {
            if shows_ref {
                out.ref_id = Some(id.to_string());
            }
            out.id = requested.to_string();
            if let Some((_, via)) = requested.split_once('@') {
                out.parent_id = via.to_string();
            }
            info!(
                from = %id,
                to = %out.id,
                parent_id = %out.parent_id,
                client = %context.client,
                "🔀 Changing DIDL id"
            );
        }
    } else if let Some(container) = context.parent_container.as_deref().filter(|c| !c.is_empty()) {
        if container != "0" && container != parent_id {
            if shows_ref {
                out.ref_id = Some(id.to_string());
            }
            out.id = format!("{id}@{container}");
            out.parent_id = container.to_string();
            info!(
                from = %id,
                to = %out.id,
                old_parent = %parent_id,
                parent_id = %out.parent_id,
                client = %context.client,
                "🔀 Changing DIDL id"
            );
        }
    }

    out
}

/// Classe UPnP annoncée au client
pub fn rewrite_class<'a>(context: &RenderContext, class: &'a str) -> &'a str {
    if context.client != ClientProfile::XBox {
        return class;
    }
    let under_folder_parent = context
        .parent_container
        .as_deref()
        .is_some_and(|p| XBOX_FOLDER_PARENTS.contains(&p));

    if class == OBJECT_CONTAINER || (under_folder_parent && class.starts_with(OBJECT_CONTAINER)) {
        STORAGE_FOLDER
    } else {
        class
    }
}

fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

fn push_text(parent: &mut Element, name: &str, text: Option<&str>) {
    if let Some(text) = text {
        parent.children.push(XMLNode::Element(text_element(name, text)));
    }
}

fn set_attr(element: &mut Element, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        element
            .attributes
            .insert(name.to_string(), value.to_string());
    }
}

fn album_art_element(art: &AlbumArt) -> Element {
    let mut element = text_element("upnp:albumArtURI", &art.uri);
    let profile = art.profile_id.as_deref().unwrap_or("JPEG_TN");
    element
        .attributes
        .insert("dlna:profileID".to_string(), profile.to_string());
    element
}

fn search_class_element(search_class: &SearchClass) -> Element {
    let mut element = text_element("upnp:searchClass", &search_class.class);
    let include_derived = search_class.include_derived.as_deref().unwrap_or("1");
    element
        .attributes
        .insert("includeDerived".to_string(), include_derived.to_string());
    element
}

fn resource_element(context: &RenderContext, resource: &Resource) -> Element {
    let protocol_info = match resource.protocol_info.parse::<ProtocolInfo>() {
        Ok(info) => info.for_client(context.client).to_string(),
        Err(_) => resource.protocol_info.clone(),
    };

    let mut element = text_element("res", &resource.url);
    element
        .attributes
        .insert("protocolInfo".to_string(), protocol_info);
    set_attr(&mut element, "size", resource.size.as_deref());
    set_attr(&mut element, "duration", resource.duration.as_deref());
    set_attr(&mut element, "bitrate", resource.bitrate.as_deref());
    set_attr(&mut element, "bitsPerSample", resource.bits_per_sample.as_deref());
    set_attr(&mut element, "sampleFrequency", resource.sample_frequency.as_deref());
    set_attr(&mut element, "nrAudioChannels", resource.nr_audio_channels.as_deref());
    set_attr(&mut element, "resolution", resource.resolution.as_deref());
    set_attr(&mut element, "importUri", resource.import_uri.as_deref());
    element
}

fn push_resources(parent: &mut Element, context: &RenderContext, resources: &[Resource]) {
    let mut resources = resources.to_vec();
    sort_resources(&mut resources);
    for resource in &resources {
        parent
            .children
            .push(XMLNode::Element(resource_element(context, resource)));
    }
}

fn description_element(description: &Description) -> Element {
    let mut element = text_element("desc", &description.content);
    set_attr(&mut element, "id", description.id.as_deref());
    set_attr(&mut element, "nameSpace", description.namespace.as_deref());
    element
}

/// Squelette commun : attributs d'identité, titre et classe
fn object_element(
    name: &str,
    context: &RenderContext,
    identity: &RenderedIdentity,
    title: &str,
    class: &str,
    restricted: Option<&str>,
) -> Element {
    let mut element = Element::new(name);
    element
        .attributes
        .insert("id".to_string(), identity.id.clone());
    element
        .attributes
        .insert("parentID".to_string(), identity.parent_id.clone());
    set_attr(&mut element, "refID", identity.ref_id.as_deref());
    element.attributes.insert(
        "restricted".to_string(),
        restricted.unwrap_or("0").to_string(),
    );

    let title = identity.title.as_deref().unwrap_or(title);
    element
        .children
        .push(XMLNode::Element(text_element("dc:title", title)));
    element.children.push(XMLNode::Element(text_element(
        "upnp:class",
        rewrite_class(context, class),
    )));
    element
}

impl Container {
    /// Élément `<container>` pour ce contexte de rendu
    pub fn to_element(&self, context: &RenderContext) -> Element {
        let identity = rewrite_identity(context, &self.id, &self.parent_id, self.ref_id.as_deref());
        let mut element = object_element(
            "container",
            context,
            &identity,
            &self.title,
            &self.class,
            self.restricted.as_deref(),
        );
        set_attr(&mut element, "childCount", self.child_count.as_deref());
        set_attr(&mut element, "searchable", self.searchable.as_deref());

        push_text(&mut element, "dc:creator", self.creator.as_deref());
        if let Some(art) = &self.album_art {
            element.children.push(XMLNode::Element(album_art_element(art)));
        }
        push_text(&mut element, "upnp:artist", self.artist.as_deref());
        push_text(&mut element, "upnp:genre", self.genre.as_deref());
        for search_class in &self.search_classes {
            element
                .children
                .push(XMLNode::Element(search_class_element(search_class)));
        }
        push_resources(&mut element, context, &self.resources);
        element
    }
}

impl Item {
    /// Élément `<item>` pour ce contexte de rendu
    pub fn to_element(&self, context: &RenderContext) -> Element {
        let identity = rewrite_identity(context, &self.id, &self.parent_id, self.ref_id.as_deref());
        let mut element = object_element(
            "item",
            context,
            &identity,
            &self.title,
            &self.class,
            self.restricted.as_deref(),
        );

        push_text(&mut element, "dc:creator", self.creator.as_deref());
        push_text(&mut element, "dc:date", self.date.as_deref());
        if let Some(art) = &self.album_art {
            element.children.push(XMLNode::Element(album_art_element(art)));
        }
        push_text(&mut element, "upnp:artist", self.artist.as_deref());
        push_text(&mut element, "upnp:album", self.album.as_deref());
        push_text(&mut element, "upnp:genre", self.genre.as_deref());
        push_text(
            &mut element,
            "upnp:originalTrackNumber",
            self.original_track_number.as_deref(),
        );
        push_text(&mut element, "dc:description", self.description.as_deref());
        push_text(
            &mut element,
            "upnp:longDescription",
            self.long_description.as_deref(),
        );
        push_resources(&mut element, context, &self.resources);
        for description in &self.descriptions {
            element
                .children
                .push(XMLNode::Element(description_element(description)));
        }
        element
    }
}

impl DidlObject {
    pub fn to_element(&self, context: &RenderContext) -> Element {
        match self {
            DidlObject::Container(c) => c.to_element(context),
            DidlObject::Item(i) => i.to_element(context),
        }
    }
}

/// Document DIDL-Lite en cours de construction
#[derive(Debug, Clone, Default)]
pub struct DidlWriter {
    context: RenderContext,
    objects: Vec<DidlObject>,
}

impl DidlWriter {
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            objects: Vec::new(),
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Ajoute un objet ; l'ordre d'ajout est l'ordre du document
    pub fn add_object(&mut self, object: impl Into<DidlObject>) {
        self.objects.push(object.into());
    }

    pub fn num_items(&self) -> usize {
        self.objects.len()
    }

    pub fn objects(&self) -> &[DidlObject] {
        &self.objects
    }

    pub fn to_element(&self) -> Element {
        let mut root = Element::new("DIDL-Lite");
        root.attributes
            .insert("xmlns".to_string(), DIDL_NAMESPACE.to_string());
        root.attributes
            .insert("xmlns:dc".to_string(), DC_NAMESPACE.to_string());
        root.attributes
            .insert("xmlns:upnp".to_string(), UPNP_NAMESPACE.to_string());
        root.attributes
            .insert("xmlns:dlna".to_string(), DLNA_NAMESPACE.to_string());

        for object in &self.objects {
            root.children
                .push(XMLNode::Element(object.to_element(&self.context)));
        }
        root
    }

    /// Sérialise le document, sans déclaration XML (certains clients
    /// anciens la refusent)
    pub fn to_xml(&self) -> Result<String> {
        let config = EmitterConfig::new()
            .write_document_declaration(false)
            .perform_indent(true)
            .indent_string("  ");

        let mut buf = Vec::new();
        self.to_element().write_with_config(&mut buf, config)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DIDLLite;
    use crate::upnp_class::{AUDIO_ITEM, MUSIC_ALBUM};

    fn album() -> Container {
        Container {
            id: "1001".into(),
            parent_id: "0".into(),
            title: "Albums".into(),
            class: OBJECT_CONTAINER.into(),
            child_count: Some("2".into()),
            ..Default::default()
        }
    }

    fn track() -> Item {
        Item {
            id: "1002".into(),
            parent_id: "1001".into(),
            title: "Track".into(),
            class: AUDIO_ITEM.into(),
            resources: vec![
                Resource::new("rtsp://host/1002", "rtsp-rtp-udp:*:audio/mpeg:*"),
                Resource::new(
                    "http://host/1002",
                    ProtocolInfo::http_get("audio/mpeg").normalized().to_string(),
                ),
            ],
            album_art: Some(AlbumArt::new("http://host/cover.jpg")),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_keeps_issue_order() {
        let mut didl = DidlWriter::new(RenderContext::children(ClientProfile::Generic, "0"));
        didl.add_object(track());
        didl.add_object(album());
        assert_eq!(didl.num_items(), 2);

        let xml = didl.to_xml().unwrap();
        let track_pos = xml.find("id=\"1002\"").unwrap();
        let album_pos = xml.find("id=\"1001\"").unwrap();
        assert!(track_pos < album_pos);

        let parsed = DIDLLite::parse(&xml).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_render_round_trip_attributes() {
        let mut didl = DidlWriter::new(RenderContext::children(ClientProfile::Generic, "1001"));
        didl.add_object(track());
        let parsed = DIDLLite::parse(&didl.to_xml().unwrap()).unwrap();

        let item = parsed.get_item_by_id("1002").unwrap();
        assert_eq!(item.parent_id, "1001");
        assert_eq!(item.ref_id, None);
        assert_eq!(item.restricted.as_deref(), Some("0"));
        assert_eq!(
            item.album_art.as_ref().unwrap().profile_id.as_deref(),
            Some("JPEG_TN")
        );

        // http-get avant rtsp, et DLNA.ORG_PS=1 retiré
        assert_eq!(item.resources[0].url, "http://host/1002");
        assert_eq!(item.resources[1].url, "rtsp://host/1002");
        assert!(!item.resources[0].protocol_info.contains("DLNA.ORG_PS=1"));
        assert!(item.resources[0].protocol_info.contains("DLNA.ORG_PN=MP3"));
    }

    #[test]
    fn test_children_through_foreign_container() {
        let context = RenderContext::children(ClientProfile::Generic, "1500");
        let identity = rewrite_identity(&context, "1002", "1001", None);
        assert_eq!(identity.id, "1002@1500");
        assert_eq!(identity.parent_id, "1500");
        assert_eq!(identity.ref_id.as_deref(), Some("1002"));

        // À travers la racine ou le parent naturel : rien ne change
        for via in ["0", "1001"] {
            let context = RenderContext::children(ClientProfile::Generic, via);
            let identity = rewrite_identity(&context, "1002", "1001", None);
            assert_eq!(identity.id, "1002");
            assert_eq!(identity.parent_id, "1001");
            assert_eq!(identity.ref_id, None);
        }
    }

    #[test]
    fn test_metadata_with_composite_id() {
        let context = RenderContext::metadata(ClientProfile::Generic, "1002@1500");
        let identity = rewrite_identity(&context, "1002", "1001", None);
        assert_eq!(identity.id, "1002@1500");
        assert_eq!(identity.parent_id, "1500");
        assert_eq!(identity.ref_id.as_deref(), Some("1002"));

        let context = RenderContext::metadata(ClientProfile::Generic, "1002");
        let identity = rewrite_identity(&context, "1002", "1001", None);
        assert_eq!(identity.id, "1002");
        assert_eq!(identity.ref_id, None);
    }

    #[test]
    fn test_root_title() {
        let root = Container {
            id: "0".into(),
            parent_id: "-1".into(),
            title: "My library".into(),
            class: OBJECT_CONTAINER.into(),
            ..Default::default()
        };
        let mut didl = DidlWriter::new(RenderContext::metadata(ClientProfile::Generic, "0"));
        didl.add_object(root);
        let parsed = DIDLLite::parse(&didl.to_xml().unwrap()).unwrap();
        let root = parsed.get_container_by_id("0").unwrap();
        assert_eq!(root.title, "root");
        assert_eq!(root.parent_id, "-1");
    }

    #[test]
    fn test_xbox_quirks() {
        let context = RenderContext::children(ClientProfile::XBox, "1500");
        let identity = rewrite_identity(&context, "1002", "1001", Some("42"));
        assert_eq!(identity.id, "1002@1500");
        assert_eq!(identity.ref_id, None);

        assert_eq!(rewrite_class(&context, OBJECT_CONTAINER), STORAGE_FOLDER);
        assert_eq!(rewrite_class(&context, MUSIC_ALBUM), MUSIC_ALBUM);
        let under_folders = RenderContext::children(ClientProfile::XBox, "15");
        assert_eq!(rewrite_class(&under_folders, MUSIC_ALBUM), STORAGE_FOLDER);
        assert_eq!(rewrite_class(&under_folders, AUDIO_ITEM), AUDIO_ITEM);

        let generic = RenderContext::children(ClientProfile::Generic, "15");
        assert_eq!(rewrite_class(&generic, OBJECT_CONTAINER), OBJECT_CONTAINER);

        let mut didl = DidlWriter::new(context);
        didl.add_object(track());
        let parsed = DIDLLite::parse(&didl.to_xml().unwrap()).unwrap();
        let item = &parsed.items[0];
        assert_eq!(item.ref_id, None);
        assert!(item.resources[0].protocol_info.ends_with(":*"));
    }

    #[test]
    fn test_container_search_classes() {
        let mut container = album();
        container.searchable = Some("1".into());
        container.search_classes.push(SearchClass {
            include_derived: None,
            class: AUDIO_ITEM.into(),
        });

        let mut didl = DidlWriter::new(RenderContext::metadata(ClientProfile::Generic, "1001"));
        didl.add_object(container);
        let parsed = DIDLLite::parse(&didl.to_xml().unwrap()).unwrap();
        let container = &parsed.containers[0];
        assert_eq!(container.searchable.as_deref(), Some("1"));
        assert_eq!(container.child_count.as_deref(), Some("2"));
        assert_eq!(
            container.search_classes[0].include_derived.as_deref(),
            Some("1")
        );
    }
}

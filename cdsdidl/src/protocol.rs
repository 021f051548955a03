//! `protocolInfo` : décodage, balises DLNA et ordre des ressources

use std::fmt;
use std::str::FromStr;

use crate::client::ClientProfile;
use crate::error::DidlError;
use crate::Resource;

/// Balises DLNA par défaut (opérations, vitesse, transcodage, flags)
pub const SIMPLE_DLNA_TAGS: [&str; 4] = [
    "DLNA.ORG_OP=01",
    "DLNA.ORG_PS=1",
    "DLNA.ORG_CI=0",
    "DLNA.ORG_FLAGS=01100000000000000000000000000000",
];

const IMAGE_FLAGS: &str = "DLNA.ORG_FLAGS=00900000000000000000000000000000";
const PLAYCONTAINER_BIT: u128 = 1 << 124;

/// Les quatre champs `protocol:network:contentFormat:additionalInfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub protocol: String,
    pub network: String,
    pub content_format: String,
    pub additional_info: String,
}

impl ProtocolInfo {
    pub fn new(
        protocol: impl Into<String>,
        network: impl Into<String>,
        content_format: impl Into<String>,
        additional_info: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            network: network.into(),
            content_format: content_format.into(),
            additional_info: additional_info.into(),
        }
    }

    /// `http-get:*:<mime>:*`, le cas courant pour un fichier servi en HTTP
    pub fn http_get(content_format: impl Into<String>) -> Self {
        Self::new("http-get", "*", content_format, "*")
    }

    /// Développe `*` en balises DLNA, et ramène `#` à un `*` littéral.
    pub fn normalized(mut self) -> Self {
        match self.additional_info.as_str() {
            "*" => {
                self.additional_info = build_dlna_additional_info(&self.content_format, false);
            }
            "#" => self.additional_info = "*".to_string(),
            _ => {}
        }
        self
    }

    /// Champ additionnel tel qu'il doit être annoncé à ce client.
    ///
    /// `DLNA.ORG_PS=1` est toujours retiré.
    pub fn additional_info_for(&self, client: ClientProfile) -> String {
        let additional_info = if client.drops_dlna_tags(&self.content_format) {
            "*"
        } else {
            self.additional_info.as_str()
        };

        let mut parts: Vec<&str> = additional_info.split(';').collect();
        if let Some(pos) = parts.iter().position(|p| *p == "DLNA.ORG_PS=1") {
            parts.remove(pos);
        }
        parts.join(";")
    }

    /// `protocolInfo` réécrit pour un client donné
    pub fn for_client(&self, client: ClientProfile) -> ProtocolInfo {
        ProtocolInfo {
            protocol: self.protocol.clone(),
            network: self.network.clone(),
            content_format: client.map_content_format(&self.content_format).to_string(),
            additional_info: self.additional_info_for(client),
        }
    }
}

impl FromStr for ProtocolInfo {
    type Err = DidlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(4, ':').collect();
        match parts.as_slice() {
            [protocol, network, content_format, additional_info] => Ok(ProtocolInfo::new(
                *protocol,
                *network,
                *content_format,
                *additional_info,
            )),
            _ => Err(DidlError::InvalidProtocolInfo(s.to_string())),
        }
    }
}

impl fmt::Display for ProtocolInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.protocol, self.network, self.content_format, self.additional_info
        )
    }
}

/// Construit le champ additionnel DLNA adapté à un type MIME.
///
/// Avec `does_playcontainer`, le bit « playcontainer » est ajouté à
/// `DLNA.ORG_FLAGS`.
pub fn build_dlna_additional_info(content_format: &str, does_playcontainer: bool) -> String {
    let with_profile = |profile: &str, flags: Option<&str>| -> Vec<String> {
        let mut tags = vec![format!("DLNA.ORG_PN={profile}")];
        tags.extend(SIMPLE_DLNA_TAGS.iter().map(|t| t.to_string()));
        if let Some(flags) = flags {
            tags[4] = flags.to_string();
        }
        tags
    };

    let mut additional_info: Vec<String> = match content_format {
        "audio/mpeg" => with_profile("MP3", None),
        "audio/ms-wma" => with_profile("WMABASE", None),
        "image/jpeg" => with_profile("JPEG_LRG", Some(IMAGE_FLAGS)),
        "image/png" => with_profile("PNG_LRG", Some(IMAGE_FLAGS)),
        "video/mpeg" => with_profile("MPEG_PS_PAL", None),
        "video/mpegts" => with_profile("MPEG_TS_PAL", None),
        "video/mp4" | "video/x-m4a" => with_profile("AVC_TS_BL_CIF15_AAC", None),
        "video/x-ms-wmv" => with_profile("WMV_BASE", None),
        "*" => SIMPLE_DLNA_TAGS.iter().map(|t| t.to_string()).collect(),
        _ => vec!["*".to_string()],
    };

    if does_playcontainer {
        for part in additional_info.iter_mut() {
            if let Some(bits) = part.strip_prefix("DLNA.ORG_FLAGS=") {
                if let Ok(bits) = u128::from_str_radix(bits, 16) {
                    *part = format!("DLNA.ORG_FLAGS={:032x}", bits | PLAYCONTAINER_BIT);
                }
                break;
            }
        }
    }

    additional_info.join(";")
}

/// Extrait le type MIME d'une chaîne qui peut être un `protocolInfo`
fn content_format_of(mimetype: &str) -> &str {
    let parts: Vec<&str> = mimetype.split(':').collect();
    if parts.len() == 4 { parts[2] } else { mimetype }
}

/// Vrai pour un type (ou `protocolInfo`) audio, y compris `application/ogg`
pub fn is_audio(mimetype: &str) -> bool {
    let mimetype = content_format_of(mimetype);
    mimetype == "application/ogg" || mimetype.starts_with("audio/")
}

/// Vrai pour un type (ou `protocolInfo`) vidéo
pub fn is_video(mimetype: &str) -> bool {
    content_format_of(mimetype).starts_with("video/")
}

fn protocol_rank(resource: &Resource) -> u8 {
    if resource.protocol_info.is_empty() {
        return 3;
    }
    let protocol = resource
        .protocol_info
        .split(':')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match protocol.as_str() {
        "http-get" => 0,
        "rtsp-rtp-udp" => 1,
        _ => 2,
    }
}

/// Trie les ressources : `http-get` d'abord, puis `rtsp-rtp-udp`, puis le
/// reste. Le tri est stable.
pub fn sort_resources(resources: &mut [Resource]) {
    resources.sort_by_key(protocol_rank);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let info: ProtocolInfo = "http-get:*:audio/mpeg:DLNA.ORG_PN=MP3".parse().unwrap();
        assert_eq!(info.protocol, "http-get");
        assert_eq!(info.content_format, "audio/mpeg");
        assert_eq!(info.to_string(), "http-get:*:audio/mpeg:DLNA.ORG_PN=MP3");

        assert!("http-get:*:audio/mpeg".parse::<ProtocolInfo>().is_err());
    }

    #[test]
    fn test_star_expands_to_dlna_tags() {
        let info = ProtocolInfo::http_get("audio/mpeg").normalized();
        assert_eq!(
            info.additional_info,
            "DLNA.ORG_PN=MP3;DLNA.ORG_OP=01;DLNA.ORG_PS=1;DLNA.ORG_CI=0;\
             DLNA.ORG_FLAGS=01100000000000000000000000000000"
        );

        let unknown = ProtocolInfo::http_get("audio/x-flac").normalized();
        assert_eq!(unknown.additional_info, "*");
    }

    #[test]
    fn test_hash_collapses_to_star() {
        let info = ProtocolInfo::new("http-get", "*", "audio/mpeg", "#").normalized();
        assert_eq!(info.additional_info, "*");
    }

    #[test]
    fn test_image_flags() {
        let tags = build_dlna_additional_info("image/jpeg", false);
        assert!(tags.starts_with("DLNA.ORG_PN=JPEG_LRG;"));
        assert!(tags.ends_with("DLNA.ORG_FLAGS=00900000000000000000000000000000"));
    }

    #[test]
    fn test_playcontainer_bit() {
        let tags = build_dlna_additional_info("*", true);
        assert!(tags.ends_with("DLNA.ORG_FLAGS=11100000000000000000000000000000"));
    }

    #[test]
    fn test_output_strips_play_speed() {
        let info = ProtocolInfo::http_get("audio/mpeg").normalized();
        let out = info.for_client(ClientProfile::Generic);
        assert!(!out.additional_info.contains("DLNA.ORG_PS=1"));
        assert!(out.additional_info.starts_with("DLNA.ORG_PN=MP3;DLNA.ORG_OP=01;DLNA.ORG_CI=0"));
    }

    #[test]
    fn test_client_rewrites() {
        let avi = ProtocolInfo::http_get("video/x-msvideo").normalized();
        assert_eq!(avi.for_client(ClientProfile::XBox).to_string(), "http-get:*:video/avi:*");
        assert_eq!(
            avi.for_client(ClientProfile::Generic).content_format,
            "video/divx"
        );

        let mpeg = ProtocolInfo::http_get("video/mpeg").normalized();
        assert_eq!(mpeg.for_client(ClientProfile::PlayStation3).additional_info, "*");
        assert_eq!(mpeg.for_client(ClientProfile::PhilipsTv).additional_info, "*");

        let mp3 = ProtocolInfo::http_get("audio/mpeg").normalized();
        assert_ne!(mp3.for_client(ClientProfile::PlayStation3).additional_info, "*");
    }

    #[test]
    fn test_audio_video_detection() {
        assert!(is_audio("audio/mpeg"));
        assert!(is_audio("application/ogg"));
        assert!(is_audio("http-get:*:audio/x-flac:*"));
        assert!(!is_audio("video/mp4"));
        assert!(is_video("http-get:*:video/mp4:*"));
    }

    #[test]
    fn test_resource_ordering() {
        let mut resources = vec![
            Resource::new("1", "file:*:*:*"),
            Resource::new("2", "rtsp-rtp-udp:*:*:*"),
            Resource::new("3", ""),
            Resource::new("4", "internal:*:*:*"),
            Resource::new("5", "http-get:*:*:*"),
            Resource::new("6", "something:*:*:*"),
            Resource::new("7", "http-get:*:*:*"),
        ];
        sort_resources(&mut resources);

        let order: Vec<&str> = resources.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(order, vec!["5", "7", "2", "1", "4", "6", "3"]);
    }
}

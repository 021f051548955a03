//! Erreurs du crate cdsdidl

use thiserror::Error;

/// Erreurs de lecture et d'écriture DIDL-Lite
#[derive(Debug, Error)]
pub enum DidlError {
    /// Document DIDL-Lite illisible
    #[error("Invalid DIDL-Lite document: {0}")]
    Parse(#[from] quick_xml::de::DeError),

    /// Échec de sérialisation XML
    #[error("Cannot write DIDL-Lite document: {0}")]
    Write(#[from] xmltree::Error),

    /// Sortie non UTF-8
    #[error("DIDL-Lite output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// `protocolInfo` qui n'a pas quatre champs
    #[error("Invalid protocolInfo: {0}")]
    InvalidProtocolInfo(String),
}

pub type Result<T> = std::result::Result<T, DidlError>;

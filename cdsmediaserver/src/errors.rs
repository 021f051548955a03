//! Erreurs du service ContentDirectory et leurs codes UPnP

use cdsdidl::DidlError;
use cdsstore::CatalogError;

/// Erreur d'une action ContentDirectory.
///
/// Chaque variante correspond à un code d'erreur UPnP (voir
/// [`ContentDirectoryError::upnp_code`]) ; la couche SOAP n'a plus qu'à
/// l'emballer dans un `<UPnPError>`.
#[derive(Debug, thiserror::Error)]
pub enum ContentDirectoryError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid args: {0}")]
    InvalidArgs(String),

    #[error("No such object: {0}")]
    NoSuchObject(String),

    #[error("Cannot process the request: {0}")]
    CannotProcess(String),

    #[error("DIDL-Lite serialization failed: {0}")]
    Serialization(#[from] DidlError),
}

impl ContentDirectoryError {
    /// Code d'erreur UPnP
    pub fn upnp_code(&self) -> u16 {
        match self {
            ContentDirectoryError::InvalidAction(_) => 401,
            ContentDirectoryError::InvalidArgs(_) => 402,
            ContentDirectoryError::NoSuchObject(_) => 701,
            ContentDirectoryError::CannotProcess(_) => 720,
            ContentDirectoryError::Serialization(_) => 501,
        }
    }

    /// Description courte attendue dans `errorDescription`
    pub fn upnp_description(&self) -> &'static str {
        match self {
            ContentDirectoryError::InvalidAction(_) => "Invalid Action",
            ContentDirectoryError::InvalidArgs(_) => "Invalid Args",
            ContentDirectoryError::NoSuchObject(_) => "No such object",
            ContentDirectoryError::CannotProcess(_) => "Cannot process the request",
            ContentDirectoryError::Serialization(_) => "Action Failed",
        }
    }
}

impl From<CatalogError> for ContentDirectoryError {
    fn from(err: CatalogError) -> Self {
        if err.is_not_found() {
            ContentDirectoryError::NoSuchObject(err.to_string())
        } else {
            ContentDirectoryError::CannotProcess(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ContentDirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ContentDirectoryError::NoSuchObject("9".into()).upnp_code(), 701);
        assert_eq!(ContentDirectoryError::InvalidArgs("x".into()).upnp_code(), 402);
        assert_eq!(ContentDirectoryError::InvalidAction("Foo".into()).upnp_code(), 401);
    }

    #[test]
    fn test_catalog_errors_mapping() {
        let err: ContentDirectoryError = CatalogError::MalformedId("abc".into()).into();
        assert_eq!(err.upnp_code(), 701);
        let err: ContentDirectoryError = CatalogError::Detached("orphan".into()).into();
        assert_eq!(err.upnp_code(), 720);
    }
}

//! Requêtes et réponses Browse
//!
//! Les arguments arrivent de la couche SOAP sous forme de chaînes ; ils
//! sont validés ici avant d'atteindre le moteur.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use cdsdidl::ClientProfile;

use crate::errors::{ContentDirectoryError, Result};

/// Argument non standard portant la signature du client
pub const CLIENT_ARGUMENT: &str = "X_UPnPClient";

/// Valeurs de `A_ARG_TYPE_BrowseFlag`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    BrowseMetadata,
    BrowseDirectChildren,
}

impl FromStr for BrowseFlag {
    type Err = ContentDirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BrowseMetadata" => Ok(BrowseFlag::BrowseMetadata),
            "BrowseDirectChildren" => Ok(BrowseFlag::BrowseDirectChildren),
            other => Err(ContentDirectoryError::InvalidArgs(format!(
                "Invalid BrowseFlag: {other}"
            ))),
        }
    }
}

impl fmt::Display for BrowseFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowseFlag::BrowseMetadata => f.write_str("BrowseMetadata"),
            BrowseFlag::BrowseDirectChildren => f.write_str("BrowseDirectChildren"),
        }
    }
}

/// Arguments d'une action Browse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseRequest {
    pub object_id: String,
    pub browse_flag: BrowseFlag,
    /// Transmis tel quel, toutes les propriétés sont renvoyées
    pub filter: String,
    pub starting_index: u32,
    /// 0 pour « tous »
    pub requested_count: u32,
    pub sort_criteria: String,
    pub client: ClientProfile,
}

impl BrowseRequest {
    pub fn new(object_id: impl Into<String>, browse_flag: BrowseFlag) -> Self {
        Self {
            object_id: object_id.into(),
            browse_flag,
            filter: "*".to_string(),
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
            client: ClientProfile::Generic,
        }
    }

    pub fn children(object_id: impl Into<String>) -> Self {
        Self::new(object_id, BrowseFlag::BrowseDirectChildren)
    }

    pub fn metadata(object_id: impl Into<String>) -> Self {
        Self::new(object_id, BrowseFlag::BrowseMetadata)
    }

    pub fn with_range(mut self, starting_index: u32, requested_count: u32) -> Self {
        self.starting_index = starting_index;
        self.requested_count = requested_count;
        self
    }

    pub fn with_client(mut self, client: ClientProfile) -> Self {
        self.client = client;
        self
    }

    /// Construit la requête depuis les arguments SOAP.
    ///
    /// `ObjectID` absent (cas de la Xbox) : on se rabat sur `ContainerID`,
    /// puis sur la racine.
    pub fn from_arguments(arguments: &HashMap<String, String>) -> Result<Self> {
        let object_id = arguments
            .get("ObjectID")
            .or_else(|| arguments.get("ContainerID"))
            .cloned()
            .unwrap_or_else(|| "0".to_string());
        let browse_flag = required(arguments, "BrowseFlag")?.parse()?;

        Ok(Self {
            object_id,
            browse_flag,
            filter: optional(arguments, "Filter"),
            starting_index: parse_ui4(arguments, "StartingIndex")?,
            requested_count: parse_ui4(arguments, "RequestedCount")?,
            sort_criteria: optional(arguments, "SortCriteria"),
            client: client_profile(arguments),
        })
    }
}

/// Sorties communes à Browse et Search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseResponse {
    /// Document DIDL-Lite
    pub result: String,
    pub number_returned: u32,
    pub total_matches: u32,
    pub update_id: u32,
}

impl BrowseResponse {
    /// Arguments de sortie, dans l'ordre du SCPD
    pub fn output_arguments(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Result", self.result.clone()),
            ("NumberReturned", self.number_returned.to_string()),
            ("TotalMatches", self.total_matches.to_string()),
            ("UpdateID", self.update_id.to_string()),
        ]
    }
}

pub(crate) fn required<'a>(arguments: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    arguments
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ContentDirectoryError::InvalidArgs(format!("{name} not found")))
}

pub(crate) fn optional(arguments: &HashMap<String, String>, name: &str) -> String {
    arguments.get(name).cloned().unwrap_or_default()
}

/// Entier non signé 32 bits (`ui4`)
pub(crate) fn parse_ui4(arguments: &HashMap<String, String>, name: &str) -> Result<u32> {
    let raw = required(arguments, name)?;
    raw.trim()
        .parse()
        .map_err(|_| ContentDirectoryError::InvalidArgs(format!("{name} must be ui4, got {raw:?}")))
}

pub(crate) fn client_profile(arguments: &HashMap<String, String>) -> ClientProfile {
    arguments
        .get(CLIENT_ARGUMENT)
        .and_then(|signature| signature.parse().ok())
        .unwrap_or_default()
}

//! Requêtes Search
//!
//! Le critère de recherche est accepté mais n'est pas interprété : tous les
//! enfants du container visé correspondent.

use std::collections::HashMap;

use cdsdidl::ClientProfile;

use crate::contentdirectory::browse::{client_profile, optional, parse_ui4};
use crate::errors::Result;

/// Arguments d'une action Search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub container_id: String,
    pub search_criteria: String,
    pub filter: String,
    pub starting_index: u32,
    pub requested_count: u32,
    pub sort_criteria: String,
    pub client: ClientProfile,
}

impl SearchRequest {
    pub fn new(container_id: impl Into<String>, search_criteria: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            search_criteria: search_criteria.into(),
            filter: "*".to_string(),
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
            client: ClientProfile::Generic,
        }
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

    pub fn from_arguments(arguments: &HashMap<String, String>) -> Result<Self> {
        let container_id = arguments
            .get("ContainerID")
            .or_else(|| arguments.get("ObjectID"))
            .cloned()
            .unwrap_or_else(|| "0".to_string());

        Ok(Self {
            container_id,
            search_criteria: optional(arguments, "SearchCriteria"),
            filter: optional(arguments, "Filter"),
            starting_index: parse_ui4(arguments, "StartingIndex")?,
            requested_count: parse_ui4(arguments, "RequestedCount")?,
            sort_criteria: optional(arguments, "SortCriteria"),
            client: client_profile(arguments),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_search() {
        let arguments: HashMap<String, String> = [
            ("ContainerID", "1001"),
            ("SearchCriteria", "upnp:class derivedfrom \"object.item.audioItem\""),
            ("StartingIndex", "0"),
            ("RequestedCount", "5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let request = SearchRequest::from_arguments(&arguments).unwrap();
        assert_eq!(request.container_id, "1001");
        assert!(request.search_criteria.starts_with("upnp:class"));
        assert_eq!(request.requested_count, 5);
        assert_eq!(request.filter, "");
    }
}

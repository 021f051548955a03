//! Signatures des actions ContentDirectory:1
//!
//! Les noms d'arguments servent à lier les requêtes et à ordonner les
//! réponses comme dans le SCPD.

/// Arguments d'entrée et de sortie d'une action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
}

pub const BROWSE: ActionDescriptor = ActionDescriptor {
    name: "Browse",
    inputs: &[
        "ObjectID",
        "BrowseFlag",
        "Filter",
        "StartingIndex",
        "RequestedCount",
        "SortCriteria",
    ],
    outputs: &["Result", "NumberReturned", "TotalMatches", "UpdateID"],
};

pub const SEARCH: ActionDescriptor = ActionDescriptor {
    name: "Search",
    inputs: &[
        "ContainerID",
        "SearchCriteria",
        "Filter",
        "StartingIndex",
        "RequestedCount",
        "SortCriteria",
    ],
    outputs: &["Result", "NumberReturned", "TotalMatches", "UpdateID"],
};

pub const GETSEARCHCAPABILITIES: ActionDescriptor = ActionDescriptor {
    name: "GetSearchCapabilities",
    inputs: &[],
    outputs: &["SearchCaps"],
};

pub const GETSORTCAPABILITIES: ActionDescriptor = ActionDescriptor {
    name: "GetSortCapabilities",
    inputs: &[],
    outputs: &["SortCaps"],
};

pub const GETSYSTEMUPDATEID: ActionDescriptor = ActionDescriptor {
    name: "GetSystemUpdateID",
    inputs: &[],
    outputs: &["Id"],
};

pub static ACTIONS: [ActionDescriptor; 5] = [
    BROWSE,
    SEARCH,
    GETSEARCHCAPABILITIES,
    GETSORTCAPABILITIES,
    GETSYSTEMUPDATEID,
];

pub fn find_action(name: &str) -> Option<&'static ActionDescriptor> {
    ACTIONS.iter().find(|action| action.name == name)
}

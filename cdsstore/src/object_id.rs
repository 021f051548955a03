//! Object identifiers as exchanged with control points.
//!
//! A catalog id is a number. Control points may send it decorated:
//! `1234@56` names object 1234 reached through container 56, and
//! `1234.2` names sub-part 2 of object 1234.

use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// Reserved id of the root container
pub const ROOT_ID: u64 = 0;

/// First id handed out by a store; ids below are reserved
pub const SEED_ITEM_ID: u64 = 1000;

/// Parent id announced for the root
pub const NO_PARENT: &str = "-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub base: u64,
    pub via_container: Option<u64>,
    pub sub: Option<u64>,
}

impl ObjectId {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            via_container: None,
            sub: None,
        }
    }

    pub fn via(mut self, container: u64) -> Self {
        self.via_container = Some(container);
        self
    }

    pub fn with_sub(mut self, sub: u64) -> Self {
        self.sub = Some(sub);
        self
    }

    /// Base id of a possibly decorated id.
    ///
    /// Everything from the first `@`, then from the first `.`, is ignored,
    /// so chained forms like `12@34@56` still resolve to 12.
    pub fn parse_base(id: &str) -> Option<u64> {
        let head = id.split('@').next().unwrap_or_default();
        let head = head.split('.').next().unwrap_or_default();
        head.trim().parse().ok()
    }
}

impl FromStr for ObjectId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CatalogError::MalformedId(s.to_string());

        let (head, via) = match s.split_once('@') {
            Some((head, via)) => (head, Some(via.parse::<u64>().map_err(|_| malformed())?)),
            None => (s, None),
        };
        let (base, sub) = match head.split_once('.') {
            Some((base, sub)) => (base, Some(sub.parse::<u64>().map_err(|_| malformed())?)),
            None => (head, None),
        };

        Ok(ObjectId {
            base: base.parse().map_err(|_| malformed())?,
            via_container: via,
            sub,
        })
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(sub) = self.sub {
            write!(f, ".{sub}")?;
        }
        if let Some(via) = self.via_container {
            write!(f, "@{via}")?;
        }
        Ok(())
    }
}

impl From<u64> for ObjectId {
    fn from(base: u64) -> Self {
        ObjectId::new(base)
    }
}

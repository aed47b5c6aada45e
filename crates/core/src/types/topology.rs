use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use super::endpoint::Endpoint;
use crate::errors::Result;

/// Immutable, ordered view of the servers in a cache cluster
///
/// Equality is order-sensitive: the same servers announced in a different
/// order compare unequal and cause a client rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologySnapshot(Vec<Endpoint>);

impl TopologySnapshot {
    /// Create a snapshot from an ordered list of endpoints
    #[must_use]
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self(endpoints)
    }

    /// A snapshot with no servers
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Parse a list of `host:port` strings
    pub fn parse<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|v| v.as_ref().parse::<Endpoint>())
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.0
    }

    #[must_use]
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.0.contains(endpoint)
    }
}

impl Deref for TopologySnapshot {
    type Target = [Endpoint];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Endpoint> for TopologySnapshot {
    fn from_iter<T: IntoIterator<Item = Endpoint>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TopologySnapshot {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TopologySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, endpoint) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{endpoint}")?;
        }
        write!(f, "]")
    }
}

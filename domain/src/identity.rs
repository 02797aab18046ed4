//! The canonical user reference used to key live connections and address
//! messages.

use crate::Id;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A user identity as asserted by a verified bearer token.
///
/// Identities arrive either as JSON numbers or as numeric strings depending on
/// which service minted the token or frame; both normalize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(Id);

impl Identity {
    pub fn new(id: Id) -> Self {
        Self(id)
    }

    pub fn id(&self) -> Id {
        self.0
    }

    /// Parses the textual form, e.g. `"42"`.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse::<Id>().ok().map(Self)
    }
}

impl From<Id> for Identity {
    fn from(id: Id) -> Self {
        Self(id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentity {
    Number(Id),
    Text(String),
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawIdentity::deserialize(deserializer)? {
            RawIdentity::Number(id) => Ok(Identity(id)),
            RawIdentity::Text(text) => Identity::parse(&text).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid identity `{text}`"))
            }),
        }
    }
}

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Opaque identifier of a channel, process, pool, declaration or type node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first group is plenty for logs
        let full = self.0.simple().to_string();
        write!(f, "{}", &full[..8])
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A single name segment: placeholders and labels.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sym(ArcStr);

impl Sym {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Sym {
    fn from(value: &str) -> Self {
        Self(ArcStr::from(value))
    }
}

impl Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dotted namespace path naming types, processes and pools.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualSym(ArcStr);

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("`{0}` is not a valid qualified name")]
pub struct InvalidQualSym(pub String);

impl QualSym {
    pub fn parse(path: &str) -> Result<Self, InvalidQualSym> {
        if path.split('.').any(|segment| segment.trim().is_empty()) {
            return Err(InvalidQualSym(path.to_owned()));
        }
        Ok(Self(ArcStr::from(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QualSym {
    type Error = InvalidQualSym;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<QualSym> for String {
    fn from(value: QualSym) -> Self {
        value.0.to_string()
    }
}

impl Display for QualSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Revision of a root. Commits compare it and move it forward by one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rev(u64);

impl Rev {
    pub fn initial() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Stamp used in the binding log: positive introduces, negative consumes.
    pub fn signed(self, intro: bool) -> i64 {
        let rev = self.0 as i64;
        if intro {
            rev
        } else {
            -rev
        }
    }
}

impl Display for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

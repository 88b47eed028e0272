//! Dotted identifier paths, used for namespaced function and variable
//! references (`os.exec`, `MyStruct.new`).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentPath {
    pub parts: Vec<String>,
}

impl IdentPath {
    pub fn from_name<S: Into<String>>(name: S) -> Self {
        IdentPath {
            parts: vec![name.into()],
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        assert!(!parts.is_empty(), "IdentPath must have at least one part");
        IdentPath { parts }
    }

    /// The final segment — the bare function/variable name.
    pub fn name(&self) -> &str {
        self.parts.last().expect("IdentPath is never empty")
    }

    /// The leading segment, if this is a namespaced reference (`ns.name`).
    pub fn namespace(&self) -> Option<&str> {
        if self.parts.len() > 1 {
            Some(&self.parts[0])
        } else {
            None
        }
    }

    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }
}

impl fmt::Display for IdentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

impl From<&str> for IdentPath {
    fn from(s: &str) -> Self {
        IdentPath::from_name(s)
    }
}

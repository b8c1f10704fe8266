//! Patent identifier families and their canonical form.
//!
//! An identifier family is a class of publication numbers that share a
//! prefix, a validation rule, and a pattern set (e.g. WO, BR). The
//! canonical form is uppercase prefix + digits only, with all whitespace,
//! slashes, and punctuation stripped: "WO 2016/162604" and
//! "/patent/WO2016162604" both normalize to `WO2016162604`.

use serde::{Deserialize, Serialize};

/// A class of patent publication numbers sharing a normalization and
/// pattern set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierFamily {
    /// WIPO international publications (WO + 4-digit year + 6-digit serial)
    Wo,
    /// Brazilian publications (BR + 7 to 12 digits)
    Br,
}

impl IdentifierFamily {
    /// All families the engine knows how to extract.
    pub const ALL: [IdentifierFamily; 2] = [IdentifierFamily::Wo, IdentifierFamily::Br];

    /// Canonical uppercase prefix for this family.
    pub fn prefix(&self) -> &'static str {
        match self {
            IdentifierFamily::Wo => "WO",
            IdentifierFamily::Br => "BR",
        }
    }
}

impl std::fmt::Display for IdentifierFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

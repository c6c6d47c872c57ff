//! Publicid identifiers.
//!
//! A slice urn addresses every lease in a slice, a sliver urn addresses one
//! lease. Sliver urns carry the composite key as their leaf,
//! `slice.type.name`, so they resolve without a lookup.

use lease_store::{Lease, LeaseKey};

use crate::error::Error;

/// prefix shared by all well-formed identifiers
pub const URN_PREFIX: &str = "urn:publicid:IDN";

/// What a raw identifier resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// every lease belonging to one slice
    Slice { slice_name: String },
    /// exactly one lease
    Sliver { key: LeaseKey },
    /// not a slice or sliver urn; refused by every operation
    Other,
}

impl Identifier {
    /// Classify a raw identifier. Classification is total: anything that is
    /// not a well-formed slice or sliver urn lands in `Other`.
    pub fn classify(raw: &str) -> Self {
        let Some(rest) = raw.strip_prefix(URN_PREFIX) else {
            return Identifier::Other;
        };
        let fields: Vec<&str> = rest.split('+').collect();
        // `rest` begins with '+', so the first field is empty:
        // ["", authority, kind, name]
        if fields.len() != 4 || !fields[0].is_empty() {
            return Identifier::Other;
        }
        let (kind, name) = (fields[2], fields[3]);
        if name.is_empty() {
            return Identifier::Other;
        }

        match kind {
            "slice" => Identifier::Slice {
                slice_name: leaf(name).to_owned(),
            },
            "sliver" => {
                let parts: Vec<&str> = name.split('.').collect();
                match parts[..] {
                    [slice_name, res_type, res_name]
                        if !slice_name.is_empty() && !res_type.is_empty() && !res_name.is_empty() =>
                    {
                        Identifier::Sliver {
                            key: LeaseKey::new(slice_name, res_type, res_name),
                        }
                    }
                    _ => Identifier::Other,
                }
            }
            _ => Identifier::Other,
        }
    }

    /// Require a slice urn, for the operations that only accept one.
    pub fn slice_name(raw: &str) -> Result<String, Error> {
        match Self::classify(raw) {
            Identifier::Slice { slice_name } => Ok(slice_name),
            _ => Err(Error::MalformedUrn(raw.to_owned())),
        }
    }
}

/// the leaf of a hierarchical name, `a.b.c` -> `c`
fn leaf(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// render the urn addressing one lease
pub fn sliver_urn(authority: &str, lease: &Lease) -> String {
    format!("{URN_PREFIX}+{authority}+sliver+{}", lease.hrn())
}

/// render the urn addressing a whole slice
pub fn slice_urn(authority: &str, slice_name: &str) -> String {
    format!("{URN_PREFIX}+{authority}+slice+{slice_name}")
}

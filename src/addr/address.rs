//! # Hierarchical addresses.
//!
//! An [`Address`] is an ordered tuple of coordinates
//! (mesh, part, host, node, lane); any suffix — and any intermediate
//! coordinate — may be absent. Addresses are immutable values; equality is
//! structural.
//!
//! ## Path form
//! ```text
//! /mesh/m1/part/p1/host/h1/node/n1/lane/l1
//! /part/p1/host/h1          (mesh coordinate elided)
//! /                          (the root)
//! ```
//!
//! ## Example
//! ```rust
//! use meshvisor::{Address, TierKind};
//!
//! let addr = Address::parse("/part/p1/host/h1").unwrap();
//! assert_eq!(addr.kind(), TierKind::Host);
//! assert_eq!(addr.local_key(), Some("h1"));
//! assert_eq!(addr.parent().kind(), TierKind::Part);
//! assert_eq!(addr.to_string(), "/part/p1/host/h1");
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::kind::TierKind;

/// Errors raised while constructing or parsing an [`Address`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The path label is not a tier kind (`mesh`, `part`, `host`, `node`, `lane`).
    #[error("unknown tier label '{label}'")]
    UnknownLabel {
        /// The offending label.
        label: String,
    },

    /// A tier label was not followed by a value segment.
    #[error("label '{label}' has no value")]
    MissingValue {
        /// The label missing its value.
        label: String,
    },

    /// Labels appeared out of hierarchy order (for example host before part).
    #[error("label '{label}' out of hierarchy order")]
    OutOfOrder {
        /// The out-of-order label.
        label: String,
    },

    /// The coordinate for this kind is already set.
    #[error("{kind} coordinate already present")]
    Occupied {
        /// The duplicated coordinate kind.
        kind: TierKind,
    },

    /// `Root` cannot be used as an address coordinate.
    #[error("root is not an addressable coordinate")]
    NotAddressable,

    /// A coordinate value was empty.
    #[error("empty coordinate value for '{label}'")]
    EmptyValue {
        /// The label whose value was empty.
        label: String,
    },
}

/// An immutable hierarchical address.
///
/// Coordinates are held in hierarchy order; a `None` coordinate is elided.
/// The deepest present coordinate determines the address [`kind`](Address::kind).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Address {
    mesh: Option<Arc<str>>,
    part: Option<Arc<str>>,
    host: Option<Arc<str>>,
    node: Option<Arc<str>>,
    lane: Option<Arc<str>>,
}

impl Address {
    /// The root address (no coordinates).
    pub fn root() -> Self {
        Self::default()
    }

    /// Starts an address at the mesh coordinate.
    pub fn mesh(name: impl Into<Arc<str>>) -> Self {
        Self {
            mesh: Some(name.into()),
            ..Self::default()
        }
    }

    /// Starts an address at the part coordinate (mesh elided).
    pub fn part(name: impl Into<Arc<str>>) -> Self {
        Self {
            part: Some(name.into()),
            ..Self::default()
        }
    }

    /// Extends this address with a part coordinate.
    pub fn and_part(mut self, name: impl Into<Arc<str>>) -> Self {
        self.part = Some(name.into());
        self
    }

    /// Extends this address with a host coordinate.
    pub fn and_host(mut self, name: impl Into<Arc<str>>) -> Self {
        self.host = Some(name.into());
        self
    }

    /// Extends this address with a node coordinate.
    pub fn and_node(mut self, name: impl Into<Arc<str>>) -> Self {
        self.node = Some(name.into());
        self
    }

    /// Extends this address with a lane coordinate.
    pub fn and_lane(mut self, name: impl Into<Arc<str>>) -> Self {
        self.lane = Some(name.into());
        self
    }

    /// Parses the labeled path form (`/part/p1/host/h1`).
    ///
    /// Labels must appear in strictly increasing hierarchy order; elided
    /// coordinates are allowed. `"/"` (or the empty string) parses to the
    /// root address.
    pub fn parse(path: &str) -> Result<Self, AddressError> {
        let mut addr = Address::root();
        let mut last_depth = 0usize;
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        while let Some(label) = segments.next() {
            let kind = TierKind::from_label(label).ok_or_else(|| AddressError::UnknownLabel {
                label: label.to_string(),
            })?;
            if kind.depth() <= last_depth {
                return Err(AddressError::OutOfOrder {
                    label: label.to_string(),
                });
            }
            let value = segments.next().ok_or_else(|| AddressError::MissingValue {
                label: label.to_string(),
            })?;
            if value.is_empty() {
                return Err(AddressError::EmptyValue {
                    label: label.to_string(),
                });
            }
            addr = addr.with_coordinate(kind, value)?;
            last_depth = kind.depth();
        }
        Ok(addr)
    }

    /// Returns a copy with the coordinate for `kind` set.
    ///
    /// Fails if the coordinate is already present or `kind` is `Root`.
    pub fn with_coordinate(
        &self,
        kind: TierKind,
        name: impl Into<Arc<str>>,
    ) -> Result<Self, AddressError> {
        let slot = match kind {
            TierKind::Root => return Err(AddressError::NotAddressable),
            TierKind::Mesh => &self.mesh,
            TierKind::Part => &self.part,
            TierKind::Host => &self.host,
            TierKind::Node => &self.node,
            TierKind::Lane => &self.lane,
        };
        if slot.is_some() {
            return Err(AddressError::Occupied { kind });
        }
        let mut next = self.clone();
        let name = name.into();
        match kind {
            TierKind::Root => unreachable!("rejected above"),
            TierKind::Mesh => next.mesh = Some(name),
            TierKind::Part => next.part = Some(name),
            TierKind::Host => next.host = Some(name),
            TierKind::Node => next.node = Some(name),
            TierKind::Lane => next.lane = Some(name),
        }
        Ok(next)
    }

    /// A copy extended with a child coordinate at the next deeper kind.
    ///
    /// Fails with [`AddressError::NotAddressable`] on a lane address.
    pub fn child(&self, name: impl Into<Arc<str>>) -> Result<Self, AddressError> {
        match self.kind().child_kind() {
            Some(kind) => self.with_coordinate(kind, name),
            None => Err(AddressError::NotAddressable),
        }
    }

    /// The coordinate value for `kind`, if present.
    pub fn coordinate(&self, kind: TierKind) -> Option<&str> {
        match kind {
            TierKind::Root => None,
            TierKind::Mesh => self.mesh.as_deref(),
            TierKind::Part => self.part.as_deref(),
            TierKind::Host => self.host.as_deref(),
            TierKind::Node => self.node.as_deref(),
            TierKind::Lane => self.lane.as_deref(),
        }
    }

    /// Present coordinates in hierarchy order.
    pub fn coordinates(&self) -> Vec<(TierKind, Arc<str>)> {
        let mut out = Vec::new();
        for kind in TierKind::COORDINATES {
            let value = match kind {
                TierKind::Mesh => &self.mesh,
                TierKind::Part => &self.part,
                TierKind::Host => &self.host,
                TierKind::Node => &self.node,
                TierKind::Lane => &self.lane,
                TierKind::Root => unreachable!("COORDINATES excludes root"),
            };
            if let Some(v) = value {
                out.push((kind, Arc::clone(v)));
            }
        }
        out
    }

    /// The kind of the deepest present coordinate (`Root` when empty).
    pub fn kind(&self) -> TierKind {
        if self.lane.is_some() {
            TierKind::Lane
        } else if self.node.is_some() {
            TierKind::Node
        } else if self.host.is_some() {
            TierKind::Host
        } else if self.part.is_some() {
            TierKind::Part
        } else if self.mesh.is_some() {
            TierKind::Mesh
        } else {
            TierKind::Root
        }
    }

    /// The value of the deepest present coordinate.
    pub fn local_key(&self) -> Option<&str> {
        self.coordinate(self.kind())
    }

    /// A copy with the deepest coordinate removed (the root stays the root).
    pub fn parent(&self) -> Self {
        let mut p = self.clone();
        match self.kind() {
            TierKind::Root => {}
            TierKind::Mesh => p.mesh = None,
            TierKind::Part => p.part = None,
            TierKind::Host => p.host = None,
            TierKind::Node => p.node = None,
            TierKind::Lane => p.lane = None,
        }
        p
    }

    /// True when this address is the root.
    pub fn is_root(&self) -> bool {
        self.kind() == TierKind::Root
    }

    /// True when every coordinate of `self` appears identically in `other`.
    pub fn is_prefix_of(&self, other: &Address) -> bool {
        self.coordinates()
            .iter()
            .all(|(kind, name)| other.coordinate(*kind) == Some(name.as_ref()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coords = self.coordinates();
        if coords.is_empty() {
            return f.write_str("/");
        }
        for (kind, name) in coords {
            write!(f, "/{}/{}", kind.label(), name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let addr = Address::parse("/mesh/m1/part/p1/host/h1/node/n1/lane/l1").unwrap();
        assert_eq!(addr.kind(), TierKind::Lane);
        assert_eq!(addr.coordinate(TierKind::Mesh), Some("m1"));
        assert_eq!(addr.coordinate(TierKind::Lane), Some("l1"));
        assert_eq!(addr.to_string(), "/mesh/m1/part/p1/host/h1/node/n1/lane/l1");
    }

    #[test]
    fn test_parse_elided_prefix() {
        let addr = Address::parse("/part/p1/host/h1").unwrap();
        assert_eq!(addr.kind(), TierKind::Host);
        assert_eq!(addr.coordinate(TierKind::Mesh), None);
        assert_eq!(addr.local_key(), Some("h1"));
    }

    #[test]
    fn test_parse_root() {
        assert!(Address::parse("/").unwrap().is_root());
        assert!(Address::parse("").unwrap().is_root());
    }

    #[test]
    fn test_parse_rejects_out_of_order() {
        let err = Address::parse("/host/h1/part/p1").unwrap_err();
        assert!(matches!(err, AddressError::OutOfOrder { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_label() {
        let err = Address::parse("/warp/w1").unwrap_err();
        assert!(matches!(err, AddressError::UnknownLabel { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_value() {
        let err = Address::parse("/part/p1/host").unwrap_err();
        assert!(matches!(err, AddressError::MissingValue { .. }));
    }

    #[test]
    fn test_structural_equality() {
        let a = Address::part("p1").and_host("h1");
        let b = Address::parse("/part/p1/host/h1").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, a.clone().and_node("n1"));
    }

    #[test]
    fn test_parent_drops_deepest() {
        let addr = Address::part("p1").and_host("h1").and_node("n1");
        assert_eq!(addr.parent().kind(), TierKind::Host);
        assert_eq!(addr.parent().parent().kind(), TierKind::Part);
        assert!(Address::root().parent().is_root());
    }

    #[test]
    fn test_child_appends_next_kind() {
        let addr = Address::part("p1").child("h1").unwrap();
        assert_eq!(addr.kind(), TierKind::Host);
        assert_eq!(addr.local_key(), Some("h1"));
        let leaf = Address::part("p1").and_host("h1").and_node("n1").and_lane("l1");
        assert!(matches!(leaf.child("x"), Err(AddressError::NotAddressable)));
    }

    #[test]
    fn test_with_coordinate_rejects_duplicates() {
        let addr = Address::part("p1");
        let err = addr.with_coordinate(TierKind::Part, "p2").unwrap_err();
        assert!(matches!(err, AddressError::Occupied { .. }));
    }

    #[test]
    fn test_prefix_relation() {
        let parent = Address::part("p1");
        let child = Address::part("p1").and_host("h1");
        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
    }
}

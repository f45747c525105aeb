//! # Tier kinds: the levels of the hierarchical namespace.

use std::fmt;

/// One level of the hierarchical namespace.
///
/// `Root` is the virtual tier above `Mesh`; it exists exactly once per
/// runtime and never appears as an address coordinate.
///
/// Intermediate coordinates may be elided from an address (for example
/// `/part/p1/host/h1` has no mesh coordinate); a container may therefore hold
/// a child of any strictly deeper kind, not only the immediately next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierKind {
    /// Virtual top of the tree; owns meshes.
    Root,
    /// A federation of parts.
    Mesh,
    /// A partition of hosts.
    Part,
    /// A host of nodes.
    Host,
    /// An addressable actor holding lanes.
    Node,
    /// A leaf state container; never a container itself.
    Lane,
}

impl TierKind {
    /// All addressable kinds in hierarchy order (excludes `Root`).
    pub const COORDINATES: [TierKind; 5] = [
        TierKind::Mesh,
        TierKind::Part,
        TierKind::Host,
        TierKind::Node,
        TierKind::Lane,
    ];

    /// Depth of this kind in the hierarchy (`Root` = 0, `Lane` = 5).
    pub fn depth(self) -> usize {
        match self {
            TierKind::Root => 0,
            TierKind::Mesh => 1,
            TierKind::Part => 2,
            TierKind::Host => 3,
            TierKind::Node => 4,
            TierKind::Lane => 5,
        }
    }

    /// The path label for this kind (`"mesh"`, `"part"`, ...).
    ///
    /// `Root` has no label; it renders as the bare `/`.
    pub fn label(self) -> &'static str {
        match self {
            TierKind::Root => "",
            TierKind::Mesh => "mesh",
            TierKind::Part => "part",
            TierKind::Host => "host",
            TierKind::Node => "node",
            TierKind::Lane => "lane",
        }
    }

    /// Parses a path label into a kind. `Root` is not parseable.
    pub fn from_label(label: &str) -> Option<TierKind> {
        match label {
            "mesh" => Some(TierKind::Mesh),
            "part" => Some(TierKind::Part),
            "host" => Some(TierKind::Host),
            "node" => Some(TierKind::Node),
            "lane" => Some(TierKind::Lane),
            _ => None,
        }
    }

    /// The immediately deeper kind (`None` for `Lane`).
    pub fn child_kind(self) -> Option<TierKind> {
        match self {
            TierKind::Root => Some(TierKind::Mesh),
            TierKind::Mesh => Some(TierKind::Part),
            TierKind::Part => Some(TierKind::Host),
            TierKind::Host => Some(TierKind::Node),
            TierKind::Node => Some(TierKind::Lane),
            TierKind::Lane => None,
        }
    }

    /// The immediately shallower kind (`None` for `Root`).
    pub fn parent_kind(self) -> Option<TierKind> {
        match self {
            TierKind::Root => None,
            TierKind::Mesh => Some(TierKind::Root),
            TierKind::Part => Some(TierKind::Mesh),
            TierKind::Host => Some(TierKind::Part),
            TierKind::Node => Some(TierKind::Host),
            TierKind::Lane => Some(TierKind::Node),
        }
    }

    /// True when this kind may hold a child of kind `child`.
    ///
    /// Any strictly deeper kind qualifies, because intermediate coordinates
    /// may be elided from addresses. Lanes are leaves.
    pub fn can_contain(self, child: TierKind) -> bool {
        self != TierKind::Lane && child.depth() > self.depth() && child != TierKind::Root
    }

    /// True when nodes of this kind keep an uplink table (node and lane tiers).
    pub fn is_linkable(self) -> bool {
        matches!(self, TierKind::Node | TierKind::Lane)
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Root => f.write_str("root"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment_follows_depth() {
        assert!(TierKind::Root.can_contain(TierKind::Mesh));
        assert!(TierKind::Root.can_contain(TierKind::Part));
        assert!(TierKind::Part.can_contain(TierKind::Host));
        assert!(TierKind::Node.can_contain(TierKind::Lane));
        assert!(!TierKind::Lane.can_contain(TierKind::Lane));
        assert!(!TierKind::Host.can_contain(TierKind::Part));
        assert!(!TierKind::Mesh.can_contain(TierKind::Root));
    }

    #[test]
    fn test_kind_navigation() {
        assert_eq!(TierKind::Root.child_kind(), Some(TierKind::Mesh));
        assert_eq!(TierKind::Lane.child_kind(), None);
        assert_eq!(TierKind::Lane.parent_kind(), Some(TierKind::Node));
        assert_eq!(TierKind::Root.parent_kind(), None);
        for kind in TierKind::COORDINATES {
            let parent = kind.parent_kind().unwrap();
            assert_eq!(parent.child_kind(), Some(kind));
        }
    }

    #[test]
    fn test_label_roundtrip() {
        for kind in TierKind::COORDINATES {
            assert_eq!(TierKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(TierKind::from_label("root"), None);
        assert_eq!(TierKind::from_label("unknown"), None);
    }
}

use crate::index::simple_index;

simple_index! {
    /// Represents a top level item (function, struct or union) that owns some
    /// amount of child nodes
    pub struct LocalDefId;
}

simple_index! {
    /// Represents a child node within some top level owner. Doubles as the
    /// memoization key of every per-node analysis table.
    pub struct ItemLocalId;
}

/// Identifies a node in the HIR for a module. Composed of the ID of the
/// enclosing owner and the local ID of the node within the owner.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct HirId {
    pub owner: LocalDefId,
    pub local_id: ItemLocalId,
}

impl HirId {
    pub fn new(owner: LocalDefId, local_id: ItemLocalId) -> Self {
        Self { owner, local_id }
    }
}

impl From<HirId> for ItemLocalId {
    fn from(value: HirId) -> Self {
        value.local_id
    }
}

impl core::fmt::Display for HirId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::index::Index;

        write!(f, "{}.{}", self.owner.index(), self.local_id.index())
    }
}

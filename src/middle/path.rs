use std::{cmp::Ordering, rc::Rc};

use itertools::Itertools;

use crate::frontend::intern::InternedSymbol;

/// A scoped name such as `main::$block_0::x` or a relative member path such
/// as `next::value`. The empty path names "the whole thing".
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdentifierPath(Rc<[InternedSymbol]>);

impl IdentifierPath {
    pub fn new() -> Self {
        Self(Rc::from(Vec::new()))
    }

    pub fn from_segments<S: Into<InternedSymbol>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[InternedSymbol] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<InternedSymbol> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<InternedSymbol> {
        self.0.last().copied()
    }

    #[must_use]
    pub fn append(&self, segment: impl Into<InternedSymbol>) -> Self {
        Self(
            self.0
                .iter()
                .copied()
                .chain(std::iter::once(segment.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn append_path(&self, other: &IdentifierPath) -> Self {
        if other.is_empty() {
            return self.clone();
        }

        Self(self.0.iter().chain(other.0.iter()).copied().collect())
    }

    pub fn starts_with(&self, prefix: &IdentifierPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn strip_prefix(&self, prefix: &IdentifierPath) -> Option<IdentifierPath> {
        self.0
            .strip_prefix(&*prefix.0)
            .map(|rest| Self(rest.iter().copied().collect()))
    }

    /// Every prefix of this path from the shortest non-empty one up to and
    /// including the path itself
    pub fn prefixes(&self) -> impl Iterator<Item = IdentifierPath> + '_ {
        (1..=self.0.len()).map(|len| Self(self.0[..len].iter().copied().collect()))
    }
}

impl Default for IdentifierPath {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for IdentifierPath {
    fn from(value: &str) -> Self {
        Self::from_segments(value.split("::").filter(|segment| !segment.is_empty()))
    }
}

impl From<InternedSymbol> for IdentifierPath {
    fn from(value: InternedSymbol) -> Self {
        Self(Rc::from(vec![value]))
    }
}

// Ordered by segment text rather than by intern index so that maps keyed on
// paths iterate the same way regardless of interning order
impl Ord for IdentifierPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .map(InternedSymbol::value)
            .cmp(other.0.iter().map(InternedSymbol::value))
    }
}

impl PartialOrd for IdentifierPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl core::fmt::Debug for IdentifierPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{self}`")
    }
}

impl core::fmt::Display for IdentifierPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("<whole>");
        }

        f.write_str(&self.0.iter().map(InternedSymbol::value).join("::"))
    }
}

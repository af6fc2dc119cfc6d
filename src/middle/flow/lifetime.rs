use std::collections::BTreeMap;

use strum::Display;

use crate::middle::path::IdentifierPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum LifetimeRole {
    /// A source of truth: a parameter, a stack slot or a heap region
    Root,
    /// A value that only lives as long as whatever it was aliased to
    Alias,
    /// The result of an expression that is not stored anywhere yet
    Temp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum LifetimeOrigin {
    /// The data held by a local variable or parameter
    LocalValue,
    /// The storage slot of a local variable or parameter
    LocalLocation,
    TempValue,
    Heap,
    None,
}

/// An abstract storage duration. Two lifetimes are the same lifetime exactly
/// when all of their fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lifetime {
    path: IdentifierPath,
    /// Distinguishes successive values written to the same slot
    version: u32,
    role: LifetimeRole,
    origin: LifetimeOrigin,
}

impl Lifetime {
    pub fn new(path: IdentifierPath, role: LifetimeRole, origin: LifetimeOrigin) -> Self {
        Self {
            path,
            version: 0,
            role,
            origin,
        }
    }

    /// The lifetime of things that need no lifetime at all
    pub fn none() -> Self {
        Self::new(IdentifierPath::new(), LifetimeRole::Temp, LifetimeOrigin::None)
    }

    /// The process-wide heap, outliving everything
    pub fn heap() -> Self {
        Self::new(
            IdentifierPath::from("$heap"),
            LifetimeRole::Root,
            LifetimeOrigin::Heap,
        )
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn path(&self) -> &IdentifierPath {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn role(&self) -> LifetimeRole {
        self.role
    }

    pub fn origin(&self) -> LifetimeOrigin {
        self.origin
    }

    pub fn is_none(&self) -> bool {
        self.origin == LifetimeOrigin::None
    }

    /// True for the global heap and for every individual heap allocation
    pub fn is_heap(&self) -> bool {
        self.origin == LifetimeOrigin::Heap
    }

    pub fn is_root(&self) -> bool {
        self.role == LifetimeRole::Root
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::none()
    }
}

impl core::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return f.write_str("{none}");
        }

        write!(f, "{}", self.path)?;

        if self.version != 0 {
            write!(f, "#{}", self.version)?;
        }

        if self.origin == LifetimeOrigin::LocalLocation {
            f.write_str("@")?;
        }

        Ok(())
    }
}

/// The lifetimes attached to one addressable thing: how long its data must
/// stay valid and how long its storage slot (if it has one) exists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LifetimeBounds {
    pub value: Lifetime,
    pub location: Lifetime,
}

impl LifetimeBounds {
    pub fn new(value: Lifetime, location: Lifetime) -> Self {
        Self { value, location }
    }

    /// A value with no storage slot
    pub fn value(value: Lifetime) -> Self {
        Self::new(value, Lifetime::none())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.value.is_none() && self.location.is_none()
    }
}

/// Maps the relative member paths of a value to their bounds. The empty path
/// is the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LifetimeBundle(BTreeMap<IdentifierPath, LifetimeBounds>);

impl LifetimeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, member: IdentifierPath, bounds: LifetimeBounds) {
        self.0.insert(member, bounds);
    }

    pub fn get(&self, member: &IdentifierPath) -> Option<&LifetimeBounds> {
        self.0.get(member)
    }

    /// Bounds of the value as a whole. Absent only for `void`
    pub fn whole(&self) -> Option<&LifetimeBounds> {
        self.0.get(&IdentifierPath::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentifierPath, &LifetimeBounds)> {
        self.0.iter()
    }

    pub fn members(&self) -> impl Iterator<Item = &IdentifierPath> {
        self.0.keys()
    }

    /// Every value lifetime in the bundle that actually needs tracking
    pub fn values(&self) -> impl Iterator<Item = &Lifetime> {
        self.0.values().map(|bounds| &bounds.value).filter(|value| !value.is_none())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The entries found under `prefix`, re-keyed relative to it
    pub fn scoped_to(&self, prefix: &IdentifierPath) -> LifetimeBundle {
        self.0
            .iter()
            .filter_map(|(member, bounds)| {
                member
                    .strip_prefix(prefix)
                    .map(|relative| (relative, bounds.clone()))
            })
            .collect()
    }
}

impl FromIterator<(IdentifierPath, LifetimeBounds)> for LifetimeBundle {
    fn from_iter<T: IntoIterator<Item = (IdentifierPath, LifetimeBounds)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

use hashbrown::{HashMap, HashSet};

use super::lifetime::LifetimeBounds;
use crate::{macros::ice, middle::path::IdentifierPath};

/// Lifetime bindings of one lexical scope
///
/// A frame only stores its own declarations plus overrides of bindings that
/// belong to enclosing frames. Lookups read through to the parent chain. When
/// a child frame is done, its overrides are handed back with
/// [`FlowFrame::into_rebindings`] so the parent can absorb or merge them.
#[derive(Debug)]
pub struct FlowFrame<'p> {
    parent: Option<&'p FlowFrame<'p>>,
    locals: HashMap<IdentifierPath, LifetimeBounds>,
    /// Paths declared by this frame (as opposed to overridden)
    declared: HashSet<IdentifierPath>,
    in_loop: bool,
}

impl FlowFrame<'static> {
    pub fn root() -> Self {
        Self {
            parent: None,
            locals: HashMap::new(),
            declared: HashSet::new(),
            in_loop: false,
        }
    }
}

impl<'p> FlowFrame<'p> {
    pub fn child(&self) -> FlowFrame<'_> {
        FlowFrame {
            parent: Some(self),
            locals: HashMap::new(),
            declared: HashSet::new(),
            in_loop: self.in_loop,
        }
    }

    pub fn loop_body(&self) -> FlowFrame<'_> {
        FlowFrame {
            in_loop: true,
            ..self.child()
        }
    }

    pub fn is_in_loop(&self) -> bool {
        self.in_loop
    }

    pub fn lookup(&self, path: &IdentifierPath) -> Option<&LifetimeBounds> {
        match self.locals.get(path) {
            Some(bounds) => Some(bounds),
            None => self.parent.and_then(|parent| parent.lookup(path)),
        }
    }

    pub fn get(&self, path: &IdentifierPath) -> &LifetimeBounds {
        match self.lookup(path) {
            Some(bounds) => bounds,
            None => ice!("looked up the lifetimes of `{path}`, which was never declared"),
        }
    }

    pub fn declare(&mut self, path: IdentifierPath, bounds: LifetimeBounds) {
        self.declared.insert(path.clone());
        self.locals.insert(path, bounds);
    }

    /// Replaces the binding of an already visible path in this frame only
    pub fn rebind(&mut self, path: IdentifierPath, bounds: LifetimeBounds) {
        if self.lookup(&path).is_none() {
            ice!("tried to rebind `{path}`, which is not visible in this scope");
        }

        self.locals.insert(path, bounds);
    }

    /// Every binding visible from this frame, innermost first wins
    pub fn visible_bindings(&self) -> HashMap<IdentifierPath, LifetimeBounds> {
        let mut bindings = match self.parent {
            Some(parent) => parent.visible_bindings(),
            None => HashMap::new(),
        };

        bindings.extend(
            self.locals
                .iter()
                .map(|(path, bounds)| (path.clone(), bounds.clone())),
        );

        bindings
    }

    /// Consumes the frame, returning the overrides it made to bindings of
    /// enclosing frames. Its own declarations go out of scope.
    pub fn into_rebindings(self) -> HashMap<IdentifierPath, LifetimeBounds> {
        let declared = self.declared;

        self.locals
            .into_iter()
            .filter(|(path, _)| !declared.contains(path))
            .collect()
    }
}

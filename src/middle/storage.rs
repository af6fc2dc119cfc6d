//! Queries code generation runs against the results of flow analysis to pick
//! the C storage of each value

use std::collections::BTreeSet;

use strum::Display;

use crate::middle::{
    flow::{LifetimeOrigin, ModuleFlowResults},
    hir::HirId,
    path::IdentifierPath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StorageClass {
    /// Plain data that can be copied around freely
    Value,
    /// Backed by a stack frame, either this function's or a caller's
    Stack,
    /// Backed only by heap regions
    Heap,
}

impl ModuleFlowResults {
    pub fn storage_class(&self, hir_id: HirId) -> StorageClass {
        let Some(whole) = self.lifetimes(hir_id).whole() else {
            return StorageClass::Value;
        };

        if whole.location.origin() == LifetimeOrigin::LocalLocation {
            return StorageClass::Stack;
        }

        if whole.value.is_none() {
            return StorageClass::Value;
        }

        if self.graph().root_dependencies(&whole.value).is_empty() {
            StorageClass::Heap
        } else {
            StorageClass::Stack
        }
    }

    /// Whether two expressions name the same C storage
    pub fn may_alias(&self, a: HirId, b: HirId) -> bool {
        let (Some(a), Some(b)) = (self.lifetimes(a).whole(), self.lifetimes(b).whole()) else {
            return false;
        };

        !a.location.is_none() && a.location == b.location
    }

    /// Variables that may hold on to data of `variable`
    pub fn dependents_of(&self, variable: &IdentifierPath) -> BTreeSet<IdentifierPath> {
        self.variables().dependents_of(variable)
    }

    /// Variables whose data `variable` may hold on to
    pub fn captures_of(&self, variable: &IdentifierPath) -> BTreeSet<IdentifierPath> {
        self.variables().captures_of(variable)
    }
}

//! A high level intermediate representation of a type checked module. Every
//! top level declaration owns an arena of expressions, and expressions refer
//! to their children by [`ItemLocalId`]. Statements are expressions of type
//! `void` so a body is a single expression tree rooted at a block.

use core::fmt::Debug;

use strum::Display;

use crate::{
    frontend::{Span, intern::InternedSymbol},
    index::IndexVec,
    macros::ice,
    middle::{path::IdentifierPath, ty::Type},
};

pub mod builder;
pub mod id;
pub mod visit;

pub use id::*;

#[derive(Debug, Default)]
pub struct Module {
    /// All the top level declarations in the module
    pub owners: IndexVec<LocalDefId, Owner>,
}

impl Module {
    pub fn owner(&self, def_id: LocalDefId) -> &Owner {
        match self.owners.get(def_id) {
            Some(owner) => owner,
            None => ice!("owner {def_id:?} does not exist in this module"),
        }
    }

    pub fn expression(&self, hir_id: HirId) -> &Expression {
        self.owner(hir_id.owner).node(hir_id.local_id)
    }
}

/// Represents a top level declaration within a module
#[derive(Debug)]
pub struct Owner {
    pub def_id: LocalDefId,
    pub kind: OwnerKind,
    /// All the expression nodes of this owner. Children are always allocated
    /// before their parents.
    pub nodes: IndexVec<ItemLocalId, Expression>,
    pub span: Span,
}

impl Owner {
    pub fn node(&self, local_id: ItemLocalId) -> &Expression {
        match self.nodes.get(local_id) {
            Some(node) => node,
            None => ice!(
                "node {local_id:?} does not exist in owner {:?}",
                self.def_id
            ),
        }
    }

    pub fn function(&self) -> Option<&Function> {
        match &self.kind {
            OwnerKind::Function(function) => Some(function),
            OwnerKind::Struct(_) | OwnerKind::Union(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum OwnerKind {
    Function(Function),
    /// Aggregates only contribute a signature to the type context
    Struct(IdentifierPath),
    Union(IdentifierPath),
}

#[derive(Debug)]
pub struct Function {
    pub path: IdentifierPath,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    pub body: ItemLocalId,
}

#[derive(Debug)]
pub struct Parameter {
    pub name: InternedSymbol,
    /// Fully scoped path of the parameter binding, e.g. `main::argc`
    pub path: IdentifierPath,
    pub ty: Type,
    pub is_writable: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct Expression {
    pub hir_id: HirId,
    pub kind: ExpressionKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Literal(Literal),
    /// Reads (or names, in place position) a local variable or parameter by
    /// its fully scoped path
    Variable(IdentifierPath),
    AddressOf(ItemLocalId),
    Dereference(ItemLocalId),
    MemberAccess {
        target: ItemLocalId,
        member: InternedSymbol,
    },
    Index {
        target: ItemLocalId,
        index: ItemLocalId,
    },
    /// Heap allocation. The node's type is a pointer to the allocated type
    New {
        initializer: Option<ItemLocalId>,
    },
    StructLiteral {
        fields: Vec<(InternedSymbol, ItemLocalId)>,
    },
    Unary {
        operator: UnaryOperatorKind,
        operand: ItemLocalId,
    },
    Binary {
        operator: BinaryOperatorKind,
        lhs: ItemLocalId,
        rhs: ItemLocalId,
    },
    Call {
        function: IdentifierPath,
        arguments: Vec<ItemLocalId>,
    },
    /// A block evaluates to its last statement
    Block(Vec<ItemLocalId>),
    VariableDeclaration {
        path: IdentifierPath,
        value: ItemLocalId,
    },
    Assignment {
        target: ItemLocalId,
        value: ItemLocalId,
    },
    If {
        condition: ItemLocalId,
        positive: ItemLocalId,
        negative: Option<ItemLocalId>,
    },
    While {
        condition: ItemLocalId,
        body: ItemLocalId,
    },
    Break,
    Continue,
}

impl ExpressionKind {
    /// Whether this kind of expression may appear as an assignment target or
    /// the operand of `&`
    pub fn is_place(&self) -> bool {
        matches!(
            self,
            ExpressionKind::Variable(_)
                | ExpressionKind::Dereference(_)
                | ExpressionKind::MemberAccess { .. }
                | ExpressionKind::Index { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Void,
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperatorKind {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperatorKind {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulus,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
    #[strum(serialize = "&&")]
    LogicalAnd,
    #[strum(serialize = "||")]
    LogicalOr,
    #[strum(serialize = "^")]
    Xor,
}

impl BinaryOperatorKind {
    /// Operators producing a `bool` regardless of their operand types
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOperatorKind::Equals
                | BinaryOperatorKind::NotEquals
                | BinaryOperatorKind::LessThan
                | BinaryOperatorKind::LessThanOrEqualTo
                | BinaryOperatorKind::GreaterThan
                | BinaryOperatorKind::GreaterThanOrEqualTo
                | BinaryOperatorKind::LogicalAnd
                | BinaryOperatorKind::LogicalOr
        )
    }
}

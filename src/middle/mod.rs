//! Everything between the syntax tree and C emission: the typed HIR, the type
//! table and the region analysis code generation relies on.

pub mod flow;
pub mod hir;
pub mod path;
pub mod storage;
pub mod ty;

//! Front end of the Helix compiler. Source files are lowered to HIR, type
//! checked and then run through flow analysis, which decides where every value
//! lives once emitted as C.

pub mod frontend;
pub mod index;
mod macros;
pub mod middle;

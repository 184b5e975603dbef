//! Abstract syntax tree types for kurly templates.
//!
//! - **Syntax layer** ([`node`]): an [`Ast`] is an ordered sequence of
//!   literal fragments and [`TagNode`]s, each tag owning the parsed AST of
//!   its own body. The tree is never mutated after parsing.
//! - **Value layer** ([`value`]): the [`Value`]s that records carry and
//!   that rendering produces.

pub mod node;
pub mod value;

pub use node::{Ast, Node, TagNode};
pub use value::{Value, join};

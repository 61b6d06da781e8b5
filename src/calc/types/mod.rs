pub mod core;
pub use core::{Connective, Polarity, TypeNode, TypeRec, TypeSpec};

pub mod definitions;
pub use definitions::{
    Alias, TypeDecl, TypeModSpec, TypeRef, TypeSnap, TypeSpecDecl, TypeVersion,
};

pub mod display;
pub mod equality;

use super::core::TypeSpec;
use crate::calc::names::{Id, QualSym, Rev};
use serde::{Deserialize, Serialize};

/// Named, revisioned binding from a qualified name to a root type node.
/// `term_id` is empty for an incepted declaration that has no definition yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub id: Id,
    pub title: QualSym,
    pub term_id: Option<Id>,
    pub rev: Rev,
}

/// Which root a declaration pointed to during `[from, to)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeVersion {
    pub decl_id: Id,
    pub term_id: Option<Id>,
    pub from: Rev,
    pub to: Option<Rev>,
}

impl TypeVersion {
    pub fn covers(&self, rev: Rev) -> bool {
        self.from <= rev && self.to.map_or(true, |to| rev < to)
    }
}

/// Name to id record, valid during `[from, to)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub sym: QualSym,
    pub id: Id,
    pub from: Rev,
    pub to: Option<Rev>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpecDecl {
    pub title: QualSym,
    pub spec: TypeSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeModSpec {
    pub id: Id,
    pub rev: Rev,
    pub spec: TypeSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub id: Id,
    pub title: QualSym,
    pub rev: Rev,
}

impl From<&TypeDecl> for TypeRef {
    fn from(decl: &TypeDecl) -> Self {
        Self {
            id: decl.id,
            title: decl.title.clone(),
            rev: decl.rev,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSnap {
    pub id: Id,
    pub title: QualSym,
    pub rev: Rev,
    pub spec: Option<TypeSpec>,
}

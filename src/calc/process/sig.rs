use crate::calc::names::{Id, QualSym, Rev, Sym};
use serde::{Deserialize, Serialize};

/// One endpoint of a process declaration: a placeholder and the name of its type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub ph: Sym,
    #[serde(rename = "type")]
    pub type_name: QualSym,
}

/// The shape every instance of a process satisfies: what it offers on its
/// provision endpoint and what it requires on its reception endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcDecl {
    pub id: Id,
    pub title: QualSym,
    pub provision: EndpointSpec,
    pub receptions: Vec<EndpointSpec>,
    pub rev: Rev,
}

impl ProcDecl {
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointSpec> {
        std::iter::once(&self.provision).chain(self.receptions.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigSpec {
    pub title: QualSym,
    pub provision: EndpointSpec,
    #[serde(default)]
    pub receptions: Vec<EndpointSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigRef {
    pub id: Id,
    pub title: QualSym,
    pub rev: Rev,
}

impl From<&ProcDecl> for SigRef {
    fn from(decl: &ProcDecl) -> Self {
        Self {
            id: decl.id,
            title: decl.title.clone(),
            rev: decl.rev,
        }
    }
}

use crate::calc::error::{Entity, Error};
use crate::calc::names::{Id, Rev};
use crate::calc::process::{ProcDecl, SigRef, SigSpec};
use crate::store::DeclStore;
use indexmap::IndexSet;
use std::sync::Arc;

/// Registry of process declarations.
#[derive(Clone)]
pub struct SigService {
    decls: Arc<dyn DeclStore>,
}

impl SigService {
    pub fn new(decls: Arc<dyn DeclStore>) -> Self {
        Self { decls }
    }

    pub fn create(&self, spec: SigSpec) -> Result<SigRef, Error> {
        let decl = ProcDecl {
            id: Id::new(),
            title: spec.title,
            provision: spec.provision,
            receptions: spec.receptions,
            rev: Rev::initial(),
        };

        let mut phs = IndexSet::new();
        for endpoint in decl.endpoints() {
            if !phs.insert(&endpoint.ph) {
                return Err(Error::ShadowedBinding(endpoint.ph.clone()));
            }
            if self.decls.select_type_by_name(&endpoint.type_name).is_none() {
                return Err(Error::not_found(Entity::Type, &endpoint.type_name));
            }
        }

        self.decls.insert_sig(decl.clone())?;
        tracing::info!(
            "Created process declaration `{}` with {} receptions",
            decl.title,
            decl.receptions.len()
        );
        Ok(SigRef::from(&decl))
    }

    pub fn retrieve(&self, id: Id) -> Result<ProcDecl, Error> {
        self.decls
            .select_sig(id)
            .ok_or_else(|| Error::not_found(Entity::Sig, id))
    }

    pub fn retrieve_all(&self) -> Vec<SigRef> {
        self.decls.select_sigs().iter().map(SigRef::from).collect()
    }
}

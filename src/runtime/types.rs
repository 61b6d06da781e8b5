use crate::calc::context::Env;
use crate::calc::error::{Entity, Error};
use crate::calc::names::{Id, QualSym, Rev};
use crate::calc::types::{TypeDecl, TypeModSpec, TypeRef, TypeSnap, TypeSpec, TypeSpecDecl};
use crate::store::DeclStore;
use std::sync::Arc;

/// Registry of named session types.
#[derive(Clone)]
pub struct TypeService {
    decls: Arc<dyn DeclStore>,
}

impl TypeService {
    pub fn new(decls: Arc<dyn DeclStore>) -> Self {
        Self { decls }
    }

    /// Declares a name without a definition, so other types can refer to it.
    pub fn incept(&self, title: QualSym) -> Result<TypeRef, Error> {
        let decl = TypeDecl {
            id: Id::new(),
            title,
            term_id: None,
            rev: Rev::initial(),
        };
        self.decls.insert_type(decl.clone(), vec![])?;
        tracing::info!("Incepted type `{}`", decl.title);
        Ok(TypeRef::from(&decl))
    }

    pub fn create(&self, spec: TypeSpecDecl) -> Result<TypeRef, Error> {
        self.check_links(&spec.title, &spec.spec)?;
        let (root, terms) = spec.spec.lower();
        let decl = TypeDecl {
            id: Id::new(),
            title: spec.title,
            term_id: Some(root),
            rev: Rev::initial(),
        };
        self.decls.insert_type(decl.clone(), terms)?;
        tracing::info!("Created type `{}` = {}", decl.title, spec.spec);
        Ok(TypeRef::from(&decl))
    }

    /// Repoints a declaration to a new definition. The previous definition
    /// stays reachable through `retrieve_at`.
    pub fn modify(&self, spec: TypeModSpec) -> Result<TypeRef, Error> {
        let decl = self
            .decls
            .select_type(spec.id)
            .ok_or_else(|| Error::not_found(Entity::Type, spec.id))?;
        if decl.rev != spec.rev {
            return Err(Error::OptimisticConflict {
                entity: Entity::Type,
                id: decl.id,
                expected: spec.rev,
                actual: decl.rev,
            });
        }
        self.check_links(&decl.title, &spec.spec)?;

        let (root, terms) = spec.spec.lower();
        let modified = TypeDecl {
            term_id: Some(root),
            rev: spec.rev.next(),
            ..decl
        };
        self.decls
            .update_type(modified.clone(), spec.rev, terms)
            .map_err(|error| {
                if error.is_retryable() {
                    tracing::warn!("Concurrent modification of `{}`", modified.title);
                }
                error
            })?;
        tracing::info!("Modified type `{}` = {}", modified.title, spec.spec);
        Ok(TypeRef::from(&modified))
    }

    pub fn retrieve(&self, id: Id) -> Result<TypeSnap, Error> {
        let decl = self
            .decls
            .select_type(id)
            .ok_or_else(|| Error::not_found(Entity::Type, id))?;
        Ok(TypeSnap {
            id,
            spec: self.lift(decl.term_id)?,
            title: decl.title,
            rev: decl.rev,
        })
    }

    /// The declaration as it was at `rev`.
    pub fn retrieve_at(&self, id: Id, rev: Rev) -> Result<TypeSnap, Error> {
        let decl = self
            .decls
            .select_type(id)
            .ok_or_else(|| Error::not_found(Entity::Type, id))?;
        let version = self
            .decls
            .select_type_at(id, rev)
            .ok_or_else(|| Error::not_found(Entity::Type, format!("{}@{}", decl.title, rev)))?;
        Ok(TypeSnap {
            id,
            title: decl.title,
            rev: version.from,
            spec: self.lift(version.term_id)?,
        })
    }

    pub fn retrieve_all(&self) -> Vec<TypeRef> {
        self.decls.select_types().iter().map(TypeRef::from).collect()
    }

    fn lift(&self, root: Option<Id>) -> Result<Option<TypeSpec>, Error> {
        root.map(|root| Env::for_types(self.decls.as_ref(), [root])?.lift(root))
            .transpose()
    }

    /// Every alias must name a declared type, or the type being defined.
    fn check_links(&self, title: &QualSym, spec: &TypeSpec) -> Result<(), Error> {
        for name in spec.links() {
            if &name != title && self.decls.select_type_by_name(&name).is_none() {
                return Err(Error::not_found(Entity::Type, name));
            }
        }
        Ok(())
    }
}

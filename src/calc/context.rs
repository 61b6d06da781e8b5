use super::error::{Entity, Error, Side};
use super::names::{Id, QualSym, Sym};
use super::process::{Cfg, ProcDecl, Term};
use super::types::{TypeNode, TypeRec, TypeSpec};
use crate::store::DeclStore;
use indexmap::{IndexMap, IndexSet};

/// Declarations and type nodes a check or a step may consult.
#[derive(Clone, Debug, Default)]
pub struct Env {
    pub types: IndexMap<Id, TypeRec>,
    /// Declared type names and their current roots (`None` while typeless).
    pub names: IndexMap<QualSym, Option<Id>>,
    pub sigs: IndexMap<Id, ProcDecl>,
}

impl Env {
    /// Everything needed to check `term` against `cfg`: the types of all bound
    /// channels, the declarations `term` spawns, and whatever those reach.
    pub fn load(store: &dyn DeclStore, cfg: &Cfg, term: &Term) -> Result<Self, Error> {
        let mut env = Self::default();
        let mut pending: Vec<Id> = cfg.chnls.values().map(|ep| ep.type_id).collect();
        for sig_id in term.sigs() {
            env.add_sig(store, sig_id, &mut pending)?;
        }
        env.fill(store, pending)?;
        Ok(env)
    }

    pub fn for_types(
        store: &dyn DeclStore,
        roots: impl IntoIterator<Item = Id>,
    ) -> Result<Self, Error> {
        let mut env = Self::default();
        env.fill(store, roots.into_iter().collect())?;
        Ok(env)
    }

    pub fn for_sig(store: &dyn DeclStore, sig_id: Id) -> Result<Self, Error> {
        let mut env = Self::default();
        let mut pending = Vec::new();
        env.add_sig(store, sig_id, &mut pending)?;
        env.fill(store, pending)?;
        Ok(env)
    }

    /// Makes sure `roots` and everything reachable from them is loaded.
    pub fn extend(&mut self, store: &dyn DeclStore, roots: &[Id]) -> Result<(), Error> {
        self.fill(store, roots.to_vec())
    }

    fn add_sig(
        &mut self,
        store: &dyn DeclStore,
        sig_id: Id,
        pending: &mut Vec<Id>,
    ) -> Result<(), Error> {
        if self.sigs.contains_key(&sig_id) {
            return Ok(());
        }
        let sig = store
            .select_sig(sig_id)
            .ok_or_else(|| Error::not_found(Entity::Sig, sig_id))?;
        for endpoint in sig.endpoints() {
            self.add_name(store, &endpoint.type_name, pending)?;
        }
        self.sigs.insert(sig_id, sig);
        Ok(())
    }

    fn add_name(
        &mut self,
        store: &dyn DeclStore,
        name: &QualSym,
        pending: &mut Vec<Id>,
    ) -> Result<(), Error> {
        if self.names.contains_key(name) {
            return Ok(());
        }
        let decl = store
            .select_type_by_name(name)
            .ok_or_else(|| Error::not_found(Entity::Type, name))?;
        self.names.insert(name.clone(), decl.term_id);
        pending.extend(decl.term_id);
        Ok(())
    }

    fn fill(&mut self, store: &dyn DeclStore, mut pending: Vec<Id>) -> Result<(), Error> {
        while !pending.is_empty() {
            let batch: IndexSet<Id> = pending
                .drain(..)
                .filter(|id| !self.types.contains_key(id))
                .collect();
            if batch.is_empty() {
                break;
            }
            let batch: Vec<Id> = batch.into_iter().collect();
            let recs = store.select_terms(&batch);
            if let Some(missing) = batch
                .iter()
                .find(|id| !recs.iter().any(|rec| rec.id == **id))
            {
                return Err(Error::not_found(Entity::TypeTerm, missing));
            }
            for rec in recs {
                pending.extend(rec.node.children());
                if let TypeNode::Link(name) = &rec.node {
                    self.add_name(store, name, &mut pending)?;
                }
                self.types.insert(rec.id, rec);
            }
        }
        Ok(())
    }

    pub fn node(&self, id: Id) -> Result<&TypeNode, Error> {
        self.types
            .get(&id)
            .map(|rec| &rec.node)
            .ok_or_else(|| Error::not_found(Entity::TypeTerm, id))
    }

    pub fn root_of(&self, name: &QualSym) -> Result<Id, Error> {
        match self.names.get(name) {
            Some(Some(root)) => Ok(*root),
            Some(None) => Err(Error::Typeless(name.clone())),
            None => Err(Error::not_found(Entity::Type, name)),
        }
    }

    /// Follows aliases until a structural node is reached.
    pub fn resolve(&self, id: Id) -> Result<(Id, &TypeNode), Error> {
        let mut seen = IndexSet::new();
        let mut id = id;
        loop {
            match self.node(id)? {
                TypeNode::Link(name) => {
                    if !seen.insert(name.clone()) {
                        return Err(Error::LinkCycle(name.clone()));
                    }
                    id = self.root_of(name)?;
                }
                node => return Ok((id, node)),
            }
        }
    }

    pub fn sig(&self, id: Id) -> Result<&ProcDecl, Error> {
        self.sigs
            .get(&id)
            .ok_or_else(|| Error::not_found(Entity::Sig, id))
    }

    /// Rebuilds the tree form of a loaded type. Aliases stay aliases.
    pub fn lift(&self, id: Id) -> Result<TypeSpec, Error> {
        Ok(match self.node(id)? {
            TypeNode::One => TypeSpec::One,
            TypeNode::Link(name) => TypeSpec::Link(name.clone()),
            TypeNode::Tensor { value, cont } => {
                TypeSpec::Tensor(Box::new(self.lift(*value)?), Box::new(self.lift(*cont)?))
            }
            TypeNode::Lolli { value, cont } => {
                TypeSpec::Lolli(Box::new(self.lift(*value)?), Box::new(self.lift(*cont)?))
            }
            TypeNode::Plus(choices) => TypeSpec::Plus(
                choices
                    .iter()
                    .map(|(label, id)| Ok((label.clone(), self.lift(*id)?)))
                    .collect::<Result<_, Error>>()?,
            ),
            TypeNode::With(choices) => TypeSpec::With(
                choices
                    .iter()
                    .map(|(label, id)| Ok((label.clone(), self.lift(*id)?)))
                    .collect::<Result<_, Error>>()?,
            ),
            TypeNode::Up(cont) => TypeSpec::Up(Box::new(self.lift(*cont)?)),
            TypeNode::Down(cont) => TypeSpec::Down(Box::new(self.lift(*cont)?)),
        })
    }

    /// Renders a loaded type for messages, falling back to its id.
    pub fn show(&self, id: Id) -> String {
        match self.lift(id) {
            Ok(typ) => typ.to_string(),
            Err(_) => format!("<{}>", id),
        }
    }
}

/// The linear context of a checking process: what it holds and what it owes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    pub assets: IndexMap<Sym, Id>,
    pub liabs: IndexMap<Sym, Id>,
}

impl Context {
    /// Channels provided from `pool_id` are owed, all others are held.
    pub fn from_cfg(pool_id: Id, cfg: &Cfg) -> Self {
        let mut ctx = Self::default();
        for (ph, ep) in &cfg.chnls {
            if ep.pool_id == pool_id {
                ctx.liabs.insert(ph.clone(), ep.type_id);
            } else {
                ctx.assets.insert(ph.clone(), ep.type_id);
            }
        }
        ctx
    }

    pub fn side_of(&self, ph: &Sym) -> Option<Side> {
        if self.liabs.contains_key(ph) {
            Some(Side::Provider)
        } else if self.assets.contains_key(ph) {
            Some(Side::Client)
        } else {
            None
        }
    }

    pub fn take_asset(&mut self, ph: &Sym) -> Result<Id, Error> {
        self.assets
            .shift_remove(ph)
            .ok_or_else(|| Error::MissingBinding(ph.clone()))
    }

    pub fn take_liab(&mut self, ph: &Sym) -> Result<Id, Error> {
        self.liabs
            .shift_remove(ph)
            .ok_or_else(|| Error::MissingBinding(ph.clone()))
    }

    pub fn put(&mut self, side: Side, ph: Sym, type_id: Id) -> Result<(), Error> {
        if self.side_of(&ph).is_some() {
            return Err(Error::ShadowedBinding(ph));
        }
        match side {
            Side::Provider => self.liabs.insert(ph, type_id),
            Side::Client => self.assets.insert(ph, type_id),
        };
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.liabs.is_empty()
    }

    pub fn obligations(&self) -> Vec<Sym> {
        self.liabs.keys().chain(self.assets.keys()).cloned().collect()
    }

    pub fn cannot_have_obligations(&self) -> Result<(), Error> {
        if !self.is_empty() {
            return Err(Error::UnfulfilledObligations(self.obligations()));
        }
        Ok(())
    }
}

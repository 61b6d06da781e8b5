use super::{DeclStore, PoolStore, ProcStore};
use crate::calc::error::{Entity, Error};
use crate::calc::names::{Id, QualSym, Rev, Sym};
use crate::calc::process::{
    Bnd, Cfg, Liab, Mod, PoolRec, PoolSnap, ProcDecl, ProcRec, SemRec, StepOp, EP,
};
use crate::calc::types::{Alias, TypeDecl, TypeRec, TypeVersion};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    types: IndexMap<Id, TypeDecl>,
    versions: Vec<TypeVersion>,
    type_aliases: Vec<Alias>,
    terms: HashMap<Id, TypeRec>,
    sigs: IndexMap<Id, ProcDecl>,
    sig_aliases: Vec<Alias>,
    procs: IndexMap<Id, ProcRec>,
    bnds: Vec<Bnd>,
    steps: HashMap<Id, SemRec>,
    pools: IndexMap<Id, PoolRec>,
    liabs: Vec<Liab>,
}

/// Every store over one mutex-guarded state.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn current(aliases: &[Alias], name: &QualSym) -> Option<Id> {
    aliases
        .iter()
        .rev()
        .find(|alias| &alias.sym == name && alias.to.is_none())
        .map(|alias| alias.id)
}

impl State {
    /// Latest binding of every placeholder of `proc_id`.
    fn chnls_of(&self, proc_id: Id) -> IndexMap<Sym, EP> {
        let mut chnls = IndexMap::new();
        for bnd in self.bnds.iter().filter(|bnd| bnd.proc_id == proc_id) {
            if bnd.is_intro() {
                chnls.insert(bnd.ph.clone(), bnd.ep);
            } else {
                chnls.shift_remove(&bnd.ph);
            }
        }
        chnls
    }

    /// Latest binding of every placeholder of every process.
    fn bindings(&self) -> IndexMap<(Id, Sym), EP> {
        let mut live = IndexMap::new();
        for bnd in &self.bnds {
            let key = (bnd.proc_id, bnd.ph.clone());
            if bnd.is_intro() {
                live.insert(key, bnd.ep);
            } else {
                live.shift_remove(&key);
            }
        }
        live
    }

    /// Live bindings of all processes: (holder, endpoint).
    fn live(&self) -> Vec<(Id, EP)> {
        self.bindings()
            .into_iter()
            .map(|((proc_id, _), ep)| (proc_id, ep))
            .collect()
    }

    /// Points every live binding of `home.chnl_id` at `home`.
    fn rehome(&mut self, home: EP) {
        let moved: Vec<Bnd> = self
            .bindings()
            .into_iter()
            .filter(|(_, ep)| ep.chnl_id == home.chnl_id && *ep != home)
            .filter_map(|((proc_id, ph), _)| {
                let pool = self.pools.get(&self.pool_of(proc_id)?)?;
                Some(Bnd {
                    proc_id,
                    ph,
                    ep: home,
                    rev: pool.rev.signed(true),
                })
            })
            .collect();
        self.bnds.extend(moved);
    }

    /// The process currently liable for `pool_id`.
    fn liable(&self, pool_id: Id) -> Option<ProcRec> {
        let mut liable = None;
        for liab in self.liabs.iter().filter(|liab| liab.pool_id == pool_id) {
            if liab.rev > 0 {
                liable = Some(liab.proc_id);
            } else if liable == Some(liab.proc_id) {
                liable = None;
            }
        }
        liable.and_then(|id| self.procs.get(&id).cloned())
    }

    fn pool_of(&self, proc_id: Id) -> Option<Id> {
        self.procs.get(&proc_id).map(|proc| proc.pool_id)
    }
}

impl DeclStore for MemoryStore {
    fn insert_type(&self, decl: TypeDecl, terms: Vec<TypeRec>) -> Result<(), Error> {
        let mut state = self.lock();
        if current(&state.type_aliases, &decl.title).is_some() {
            return Err(Error::AlreadyDefined(Entity::Type, decl.title.to_string()));
        }
        state.terms.extend(terms.into_iter().map(|rec| (rec.id, rec)));
        state.type_aliases.push(Alias {
            sym: decl.title.clone(),
            id: decl.id,
            from: decl.rev,
            to: None,
        });
        state.versions.push(TypeVersion {
            decl_id: decl.id,
            term_id: decl.term_id,
            from: decl.rev,
            to: None,
        });
        state.types.insert(decl.id, decl);
        Ok(())
    }

    fn update_type(
        &self,
        decl: TypeDecl,
        expected: Rev,
        terms: Vec<TypeRec>,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        let stored = state
            .types
            .get(&decl.id)
            .ok_or_else(|| Error::not_found(Entity::Type, decl.id))?;
        if stored.rev != expected {
            return Err(Error::OptimisticConflict {
                entity: Entity::Type,
                id: decl.id,
                expected,
                actual: stored.rev,
            });
        }
        state.terms.extend(terms.into_iter().map(|rec| (rec.id, rec)));
        for version in state
            .versions
            .iter_mut()
            .filter(|version| version.decl_id == decl.id && version.to.is_none())
        {
            version.to = Some(decl.rev);
        }
        state.versions.push(TypeVersion {
            decl_id: decl.id,
            term_id: decl.term_id,
            from: decl.rev,
            to: None,
        });
        state.types.insert(decl.id, decl);
        Ok(())
    }

    fn select_type(&self, id: Id) -> Option<TypeDecl> {
        self.lock().types.get(&id).cloned()
    }

    fn select_type_at(&self, id: Id, rev: Rev) -> Option<TypeVersion> {
        self.lock()
            .versions
            .iter()
            .find(|version| version.decl_id == id && version.covers(rev))
            .cloned()
    }

    fn select_type_by_name(&self, name: &QualSym) -> Option<TypeDecl> {
        let state = self.lock();
        let id = current(&state.type_aliases, name)?;
        state.types.get(&id).cloned()
    }

    fn select_types(&self) -> Vec<TypeDecl> {
        self.lock().types.values().cloned().collect()
    }

    fn select_terms(&self, ids: &[Id]) -> Vec<TypeRec> {
        let state = self.lock();
        ids.iter()
            .filter_map(|id| state.terms.get(id).cloned())
            .collect()
    }

    fn insert_sig(&self, decl: ProcDecl) -> Result<(), Error> {
        let mut state = self.lock();
        if current(&state.sig_aliases, &decl.title).is_some() {
            return Err(Error::AlreadyDefined(Entity::Sig, decl.title.to_string()));
        }
        state.sig_aliases.push(Alias {
            sym: decl.title.clone(),
            id: decl.id,
            from: decl.rev,
            to: None,
        });
        state.sigs.insert(decl.id, decl);
        Ok(())
    }

    fn select_sig(&self, id: Id) -> Option<ProcDecl> {
        self.lock().sigs.get(&id).cloned()
    }

    fn select_sigs(&self) -> Vec<ProcDecl> {
        self.lock().sigs.values().cloned().collect()
    }
}

impl ProcStore for MemoryStore {
    fn select_proc_rec(&self, proc_id: Id) -> Option<ProcRec> {
        self.lock().procs.get(&proc_id).cloned()
    }

    fn select_proc(&self, proc_id: Id) -> Result<Cfg, Error> {
        let state = self.lock();
        let proc = state
            .procs
            .get(&proc_id)
            .ok_or_else(|| Error::not_found(Entity::Proc, proc_id))?;
        let rev = state
            .pools
            .get(&proc.pool_id)
            .map(|pool| pool.rev)
            .ok_or_else(|| Error::not_found(Entity::Pool, proc.pool_id))?;

        let chnls = state.chnls_of(proc_id);
        let mut steps = IndexMap::new();
        let mut peers = IndexMap::new();
        for ep in chnls.values() {
            let mut chnl_id = ep.chnl_id;
            while let Some(rec) = state.steps.get(&chnl_id) {
                if steps.insert(chnl_id, rec.clone()).is_some() {
                    break;
                }
                if rec.pool_id() != proc.pool_id {
                    if let Some(pool) = state.pools.get(&rec.pool_id()) {
                        peers.insert(pool.id, pool.rev);
                    }
                }
                match rec {
                    SemRec::Fwd(fwd) => chnl_id = fwd.target,
                    _ => break,
                }
            }
        }
        // a forward may have moved our own continuation off our channels
        for (chnl_id, rec) in &state.steps {
            if matches!(rec, SemRec::Svc(svc) if svc.proc_id == proc_id) {
                steps.entry(*chnl_id).or_insert_with(|| rec.clone());
            }
        }

        Ok(Cfg {
            proc_id,
            pool_id: proc.pool_id,
            rev,
            chnls,
            steps,
            peers,
        })
    }

    fn select_ep(&self, chnl_id: Id) -> Option<EP> {
        let state = self.lock();
        state
            .live()
            .into_iter()
            .find(|(holder, ep)| {
                ep.chnl_id == chnl_id && state.pool_of(*holder) == Some(ep.pool_id)
            })
            .map(|(_, ep)| ep)
    }

    fn select_clients(&self, chnl_id: Id) -> Vec<Id> {
        let state = self.lock();
        state
            .live()
            .into_iter()
            .filter(|(holder, ep)| {
                ep.chnl_id == chnl_id && state.pool_of(*holder) != Some(ep.pool_id)
            })
            .map(|(holder, _)| holder)
            .collect()
    }

    fn update_proc(&self, m: &Mod) -> Result<(), Error> {
        let mut state = self.lock();

        for lock in &m.locks {
            let pool = state
                .pools
                .get(&lock.pool_id)
                .ok_or_else(|| Error::not_found(Entity::Pool, lock.pool_id))?;
            if pool.rev != lock.rev {
                tracing::warn!(pool = %pool.id, expected = %lock.rev, actual = %pool.rev, "stale commit");
                return Err(Error::OptimisticConflict {
                    entity: Entity::Pool,
                    id: pool.id,
                    expected: lock.rev,
                    actual: pool.rev,
                });
            }
        }
        if let Some(pool) = m.pools.iter().find(|pool| state.pools.contains_key(&pool.id)) {
            return Err(Error::AlreadyDefined(Entity::Pool, pool.id.to_string()));
        }

        // replay record ops against an overlay before touching anything
        let mut occupied: HashMap<Id, bool> = HashMap::new();
        for op in &m.steps {
            let chnl_id = match op {
                StepOp::Put(rec) => rec.chnl_id(),
                StepOp::Take(chnl_id) => *chnl_id,
            };
            let present = occupied
                .get(&chnl_id)
                .copied()
                .unwrap_or_else(|| state.steps.contains_key(&chnl_id));
            let wants_present = matches!(op, StepOp::Take(_));
            if present != wants_present {
                tracing::warn!(chnl = %chnl_id, "record slot changed concurrently");
                return Err(Error::RecordConflict(chnl_id));
            }
            occupied.insert(chnl_id, !present);
        }

        for lock in &m.locks {
            if let Some(pool) = state.pools.get_mut(&lock.pool_id) {
                pool.rev = lock.rev.next();
            }
        }
        for pool in &m.pools {
            state.pools.insert(pool.id, pool.clone());
        }
        for proc in &m.procs {
            state.procs.insert(proc.id, proc.clone());
        }
        state.bnds.extend(m.bnds.iter().cloned());
        for home in &m.homes {
            state.rehome(*home);
        }
        state.liabs.extend(m.liabs.iter().cloned());
        for op in &m.steps {
            match op {
                StepOp::Put(rec) => {
                    state.steps.insert(rec.chnl_id(), rec.clone());
                }
                StepOp::Take(chnl_id) => {
                    state.steps.remove(chnl_id);
                }
            }
        }
        Ok(())
    }
}

impl PoolStore for MemoryStore {
    fn insert(&self, pool: PoolRec) -> Result<(), Error> {
        let mut state = self.lock();
        if state.pools.contains_key(&pool.id) {
            return Err(Error::AlreadyDefined(Entity::Pool, pool.id.to_string()));
        }
        state.pools.insert(pool.id, pool);
        Ok(())
    }

    fn insert_liab(&self, liab: Liab, expected: Rev) -> Result<(), Error> {
        let mut state = self.lock();
        let pool = state
            .pools
            .get_mut(&liab.pool_id)
            .ok_or_else(|| Error::not_found(Entity::Pool, liab.pool_id))?;
        if pool.rev != expected {
            return Err(Error::OptimisticConflict {
                entity: Entity::Pool,
                id: pool.id,
                expected,
                actual: pool.rev,
            });
        }
        pool.rev = expected.next();
        state.liabs.push(liab);
        Ok(())
    }

    fn select_pool(&self, pool_id: Id) -> Option<PoolRec> {
        self.lock().pools.get(&pool_id).cloned()
    }

    fn select_refs(&self) -> Vec<PoolRec> {
        self.lock().pools.values().cloned().collect()
    }

    fn select_subs(&self, pool_id: Id) -> Option<PoolSnap> {
        let state = self.lock();
        let pool = state.pools.get(&pool_id).cloned()?;
        let subs = state
            .pools
            .values()
            .filter(|sub| sub.sup == Some(pool_id))
            .cloned()
            .collect();
        let liable = state.liable(pool_id).map(|proc| proc.id);
        Some(PoolSnap { pool, subs, liable })
    }

    fn select_liable(&self, pool_id: Id) -> Option<ProcRec> {
        self.lock().liable(pool_id)
    }
}

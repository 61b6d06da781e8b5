use crate::calc::checking::check_state;
use crate::calc::context::Env;
use crate::calc::error::{Entity, Error, ErrorKind};
use crate::calc::names::Id;
use crate::calc::process::{
    Bnd, Liab, Mod, PollSpec, ProcRec, ProcSnap, ProcessRef, ProcessSpec, StepSpec, Term, EP,
};
use crate::calc::step::take_with;
use crate::config::EngineConfig;
use crate::store::{DeclStore, PoolStore, ProcStore};
use std::sync::Arc;

/// Instantiates processes and drives their steps against the stores.
#[derive(Clone)]
pub struct Engine {
    decls: Arc<dyn DeclStore>,
    procs: Arc<dyn ProcStore>,
    pools: Arc<dyn PoolStore>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        decls: Arc<dyn DeclStore>,
        procs: Arc<dyn ProcStore>,
        pools: Arc<dyn PoolStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            decls,
            procs,
            pools,
            config,
        }
    }

    /// Instantiates `spec.sig_id` in `spec.pool_id`. Each reception is bound
    /// to an existing channel nobody holds yet; the new process becomes
    /// liable for the pool.
    pub fn create(&self, spec: ProcessSpec) -> Result<ProcessRef, Error> {
        let sig = self
            .decls
            .select_sig(spec.sig_id)
            .ok_or_else(|| Error::not_found(Entity::Sig, spec.sig_id))?;
        let pool = self
            .pools
            .select_pool(spec.pool_id)
            .ok_or_else(|| Error::not_found(Entity::Pool, spec.pool_id))?;
        if spec.values.len() != sig.receptions.len() {
            return Err(Error::ArityMismatch {
                what: "reception endpoints",
                want: sig.receptions.len(),
                got: spec.values.len(),
            });
        }

        let mut env = Env::for_sig(self.decls.as_ref(), sig.id)?;
        let mut m = Mod::default();
        m.lock(pool.id, pool.rev);
        let rev = pool.rev.next();

        let proc_id = Id::new();
        m.procs.push(ProcRec {
            id: proc_id,
            pool_id: pool.id,
            sig_id: sig.id,
        });
        m.liabs.push(Liab {
            pool_id: pool.id,
            proc_id,
            rev: rev.signed(true),
        });

        let provision = EP {
            chnl_id: Id::new(),
            type_id: env.root_of(&sig.provision.type_name)?,
            pool_id: pool.id,
        };
        m.bnds.push(Bnd {
            proc_id,
            ph: sig.provision.ph.clone(),
            ep: provision,
            rev: rev.signed(true),
        });

        for reception in &sig.receptions {
            let chnl_id = *spec
                .values
                .get(&reception.ph)
                .ok_or_else(|| Error::MissingBinding(reception.ph.clone()))?;
            let ep = self
                .procs
                .select_ep(chnl_id)
                .ok_or_else(|| Error::not_found(Entity::Chnl, chnl_id))?;
            if m.bnds.iter().any(|bnd| bnd.ep.chnl_id == chnl_id)
                || !self.procs.select_clients(chnl_id).is_empty()
            {
                return Err(Error::Held(chnl_id));
            }
            if ep.pool_id == pool.id {
                return Err(Error::PoolLoop {
                    chnl: chnl_id,
                    pool: pool.id,
                });
            }

            env.extend(self.decls.as_ref(), &[ep.type_id])?;
            let want = env.root_of(&reception.type_name)?;
            if !env.eqtp(want, ep.type_id)? {
                return Err(Error::TypeMismatch {
                    want: env.show(want),
                    got: env.show(ep.type_id),
                });
            }
            m.bnds.push(Bnd {
                proc_id,
                ph: reception.ph.clone(),
                ep,
                rev: rev.signed(true),
            });
        }

        self.procs.update_proc(&m)?;
        tracing::info!("Created process {} of `{}` in pool {}", proc_id, sig.title, pool.id);
        Ok(ProcessRef {
            proc_id,
            pool_id: pool.id,
            chnl_id: provision.chnl_id,
        })
    }

    /// Checks one transition against the current state and computes what it
    /// changes, without committing anything.
    pub fn derive(&self, spec: &StepSpec) -> Result<(Option<StepSpec>, Mod), Error> {
        let mut cfg = self.procs.select_proc(spec.proc_id)?;
        if cfg.pool_id != spec.pool_id {
            return Err(Error::ForeignProcess {
                proc: spec.proc_id,
                pool: spec.pool_id,
            });
        }
        if let Some(svc) = cfg.waiting() {
            return Err(Error::Suspended {
                proc: spec.proc_id,
                chnl: svc.chnl_id,
            });
        }
        if let Term::Spawn { pool, .. } = &spec.term {
            let target = self
                .pools
                .select_pool(*pool)
                .ok_or_else(|| Error::not_found(Entity::Pool, pool))?;
            cfg.peers.insert(target.id, target.rev);
        }

        tracing::debug!("Step of {} at {}: {}", spec.proc_id, cfg.rev, spec.term);
        let env = Env::load(self.decls.as_ref(), &cfg, &spec.term)?;
        check_state(spec.pool_id, &env, &cfg, &spec.term)?;
        take_with(&env, &cfg, &spec.term).map_err(|error| {
            if error.kind() == ErrorKind::Fault {
                tracing::error!("Step of {} failed: {}", spec.proc_id, error);
            }
            error
        })
    }

    /// Commits a derived transition. Fails if anything it read has moved on.
    pub fn commit(&self, spec: &StepSpec, m: &Mod) -> Result<(), Error> {
        self.procs.update_proc(m)?;
        tracing::info!(
            proc = %spec.proc_id,
            op = %spec.term.operation(),
            bnds = m.bnds.len(),
            "committed"
        );
        Ok(())
    }

    /// Checks and takes one transition, returning the one that follows it.
    pub fn step(&self, spec: &StepSpec) -> Result<Option<StepSpec>, Error> {
        let (next, m) = self.derive(spec)?;
        self.commit(spec, &m)?;
        Ok(next)
    }

    /// Takes `spec` and every step it completes, until one of them waits.
    ///
    /// Once a step has committed, a failure further down the chain comes back
    /// as `Interrupted`, carrying the step that did not happen.
    pub fn take(&self, spec: StepSpec) -> Result<(), Error> {
        let mut next = Some(spec);
        let mut taken = 0;
        while let Some(spec) = next {
            let result = if taken == self.config.max_steps {
                tracing::error!("Step chain exceeded {} steps", self.config.max_steps);
                Err(Error::StepLimit(self.config.max_steps))
            } else {
                self.step(&spec)
            };
            next = match result {
                Ok(next) => next,
                Err(error) if taken == 0 => return Err(error),
                Err(error) => {
                    tracing::warn!(proc = %spec.proc_id, taken, "step chain interrupted");
                    return Err(Error::Interrupted {
                        taken,
                        pending: Box::new(spec),
                        source: Box::new(error),
                    });
                }
            };
            taken += 1;
        }
        Ok(())
    }

    /// The process currently liable for a pool, with the channel it provides.
    pub fn poll(&self, spec: PollSpec) -> Result<ProcessRef, Error> {
        let proc = self
            .pools
            .select_liable(spec.pool_id)
            .ok_or_else(|| Error::not_found(Entity::Proc, format!("liable in {}", spec.pool_id)))?;
        let sig = self
            .decls
            .select_sig(proc.sig_id)
            .ok_or_else(|| Error::not_found(Entity::Sig, proc.sig_id))?;
        let cfg = self.procs.select_proc(proc.id)?;
        let ep = cfg
            .chnls
            .get(&sig.provision.ph)
            .ok_or_else(|| Error::not_found(Entity::Chnl, &sig.provision.ph))?;
        Ok(ProcessRef {
            proc_id: proc.id,
            pool_id: proc.pool_id,
            chnl_id: ep.chnl_id,
        })
    }

    pub fn retrieve(&self, proc_id: Id) -> Result<ProcSnap, Error> {
        let proc = self
            .procs
            .select_proc_rec(proc_id)
            .ok_or_else(|| Error::not_found(Entity::Proc, proc_id))?;
        let cfg = self.procs.select_proc(proc_id)?;
        Ok(ProcSnap {
            proc_id,
            pool_id: proc.pool_id,
            sig_id: proc.sig_id,
            rev: cfg.rev,
            chnls: cfg.chnls,
            steps: cfg.steps.into_values().collect(),
        })
    }
}

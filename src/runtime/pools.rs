use crate::calc::error::{Entity, Error};
use crate::calc::names::{Id, Rev};
use crate::calc::process::{Liab, PoolRec, PoolSnap, PoolSpec};
use crate::store::{PoolStore, ProcStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct PoolService {
    pools: Arc<dyn PoolStore>,
    procs: Arc<dyn ProcStore>,
}

impl PoolService {
    pub fn new(pools: Arc<dyn PoolStore>, procs: Arc<dyn ProcStore>) -> Self {
        Self { pools, procs }
    }

    pub fn create(&self, spec: PoolSpec) -> Result<PoolRec, Error> {
        if let Some(sup) = spec.sup {
            if self.pools.select_pool(sup).is_none() {
                return Err(Error::not_found(Entity::Pool, sup));
            }
        }
        let pool = PoolRec {
            id: Id::new(),
            title: spec.title,
            sup: spec.sup,
            rev: Rev::initial(),
        };
        self.pools.insert(pool.clone())?;
        tracing::info!("Created pool {}", pool.id);
        Ok(pool)
    }

    pub fn retrieve(&self, pool_id: Id) -> Result<PoolSnap, Error> {
        self.pools
            .select_subs(pool_id)
            .ok_or_else(|| Error::not_found(Entity::Pool, pool_id))
    }

    pub fn retrieve_all(&self) -> Vec<PoolRec> {
        self.pools.select_refs()
    }

    /// Makes `proc_id`, which must live in the pool, liable for it.
    pub fn hand_off(&self, pool_id: Id, proc_id: Id, rev: Rev) -> Result<Rev, Error> {
        let proc = self
            .procs
            .select_proc_rec(proc_id)
            .ok_or_else(|| Error::not_found(Entity::Proc, proc_id))?;
        if proc.pool_id != pool_id {
            return Err(Error::ForeignProcess {
                proc: proc_id,
                pool: pool_id,
            });
        }
        let liab = Liab {
            pool_id,
            proc_id,
            rev: rev.next().signed(true),
        };
        self.pools.insert_liab(liab, rev).map_err(|error| {
            if error.is_retryable() {
                tracing::warn!("Hand-off of pool {} lost a race", pool_id);
            }
            error
        })?;
        tracing::info!("Pool {} handed off to {}", pool_id, proc_id);
        Ok(rev.next())
    }
}

//! Persistence seams of the runtime. Services receive these as `Arc<dyn ...>`.
//! `MemoryStore` implements all three over one lock.

use crate::calc::error::Error;
use crate::calc::names::{Id, QualSym, Rev};
use crate::calc::process::{Cfg, Liab, Mod, PoolRec, PoolSnap, ProcDecl, ProcRec, EP};
use crate::calc::types::{TypeDecl, TypeRec, TypeVersion};

mod memory;
pub use memory::MemoryStore;

/// Type and process declarations. Names are registered as aliases with
/// validity windows; declarations and type terms are never deleted.
pub trait DeclStore: Send + Sync {
    /// Fails with `AlreadyDefined` if the title is taken.
    fn insert_type(&self, decl: TypeDecl, terms: Vec<TypeRec>) -> Result<(), Error>;
    /// Repoints `decl` to a new root, provided it is still at `expected`.
    fn update_type(&self, decl: TypeDecl, expected: Rev, terms: Vec<TypeRec>)
        -> Result<(), Error>;
    fn select_type(&self, id: Id) -> Option<TypeDecl>;
    fn select_type_at(&self, id: Id, rev: Rev) -> Option<TypeVersion>;
    fn select_type_by_name(&self, name: &QualSym) -> Option<TypeDecl>;
    fn select_types(&self) -> Vec<TypeDecl>;
    /// Type nodes by id. Unknown ids are skipped.
    fn select_terms(&self, ids: &[Id]) -> Vec<TypeRec>;

    fn insert_sig(&self, decl: ProcDecl) -> Result<(), Error>;
    fn select_sig(&self, id: Id) -> Option<ProcDecl>;
    fn select_sigs(&self) -> Vec<ProcDecl>;
}

/// Process instances, the binding log and the pending records.
pub trait ProcStore: Send + Sync {
    fn select_proc_rec(&self, proc_id: Id) -> Option<ProcRec>;
    /// Replays the binding log of `proc_id` and collects the records on its
    /// channels, following pending forwards, plus any continuation it left
    /// pending elsewhere.
    fn select_proc(&self, proc_id: Id) -> Result<Cfg, Error>;
    /// The endpoint of a live channel as its provider sees it.
    fn select_ep(&self, chnl_id: Id) -> Option<EP>;
    /// Processes holding `chnl_id` without providing it.
    fn select_clients(&self, chnl_id: Id) -> Vec<Id>;
    /// Commits everything in `m` or nothing. Fails with `OptimisticConflict`
    /// when a locked pool moved on, and with `RecordConflict` when a record
    /// slot is not in the state the step expects. Every holder of a channel
    /// listed in `m.homes` is rebound to it.
    fn update_proc(&self, m: &Mod) -> Result<(), Error>;
}

pub trait PoolStore: Send + Sync {
    fn insert(&self, pool: PoolRec) -> Result<(), Error>;
    /// Appends `liab`, provided the pool is still at `expected`.
    fn insert_liab(&self, liab: Liab, expected: Rev) -> Result<(), Error>;
    fn select_pool(&self, pool_id: Id) -> Option<PoolRec>;
    fn select_refs(&self) -> Vec<PoolRec>;
    fn select_subs(&self, pool_id: Id) -> Option<PoolSnap>;
    /// The process currently liable for `pool_id`.
    fn select_liable(&self, pool_id: Id) -> Option<ProcRec>;
}

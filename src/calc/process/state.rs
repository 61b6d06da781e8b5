use super::term::Term;
use crate::calc::names::{Id, QualSym, Rev, Sym};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A concrete channel as seen through a placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EP {
    pub chnl_id: Id,
    pub type_id: Id,
    /// Pool of the process providing this channel.
    pub pool_id: Id,
}

/// Entry of the append-only binding log. Positive `rev` introduces the
/// placeholder, negative `rev` consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bnd {
    pub proc_id: Id,
    pub ph: Sym,
    pub ep: EP,
    pub rev: i64,
}

impl Bnd {
    pub fn is_intro(&self) -> bool {
        self.rev > 0
    }
}

/// Payload of a value-producing half: what the consumer will receive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Close,
    Send { value: EP, cont: EP },
    Lab { label: Sym, cont: EP },
    Acquire { cont: EP },
    Detach { cont: EP },
}

impl Value {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Send { .. } => "send",
            Self::Lab { .. } => "lab",
            Self::Acquire { .. } => "acquire",
            Self::Detach { .. } => "detach",
        }
    }
}

/// A consumer's pending continuation, expressed in its own placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cont {
    Wait { cont: Term },
    Recv { value: Sym, cont: Term },
    Case { conts: BTreeMap<Sym, Term> },
    Accept { cont: Term },
    Release { cont: Term },
}

impl Cont {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wait { .. } => "wait",
            Self::Recv { .. } => "recv",
            Self::Case { .. } => "case",
            Self::Accept { .. } => "accept",
            Self::Release { .. } => "release",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRec {
    pub chnl_id: Id,
    pub pool_id: Id,
    pub proc_id: Id,
    pub val: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvcRec {
    pub chnl_id: Id,
    pub pool_id: Id,
    pub proc_id: Id,
    /// Consumer's placeholder for the channel, rebound on completion.
    pub via: Sym,
    pub ep: EP,
    pub cont: Cont,
}

/// A forward nobody has acted on yet: whatever lands on `chnl_id` belongs to `target`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FwdRec {
    pub chnl_id: Id,
    pub pool_id: Id,
    pub proc_id: Id,
    pub target: Id,
}

/// One half of a rendezvous, persisted until its dual arrives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemRec {
    Msg(MsgRec),
    Svc(SvcRec),
    Fwd(FwdRec),
}

impl SemRec {
    pub fn chnl_id(&self) -> Id {
        match self {
            Self::Msg(rec) => rec.chnl_id,
            Self::Svc(rec) => rec.chnl_id,
            Self::Fwd(rec) => rec.chnl_id,
        }
    }

    pub fn pool_id(&self) -> Id {
        match self {
            Self::Msg(rec) => rec.pool_id,
            Self::Svc(rec) => rec.pool_id,
            Self::Fwd(rec) => rec.pool_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Msg(_) => "message",
            Self::Svc(_) => "service",
            Self::Fwd(_) => "forward",
        }
    }

    /// The same record keyed by another channel.
    pub fn moved_to(self, chnl_id: Id) -> Self {
        match self {
            Self::Msg(rec) => Self::Msg(MsgRec { chnl_id, ..rec }),
            Self::Svc(rec) => Self::Svc(SvcRec { chnl_id, ..rec }),
            Self::Fwd(rec) => Self::Fwd(FwdRec { chnl_id, ..rec }),
        }
    }
}

/// Current configuration of one process, derived from the binding log and
/// the pending records on its channels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cfg {
    pub proc_id: Id,
    pub pool_id: Id,
    /// Revision of `pool_id` this snapshot was read at.
    pub rev: Rev,
    pub chnls: IndexMap<Sym, EP>,
    /// Pending records on the process's channels, and on channels they forward to.
    pub steps: IndexMap<Id, SemRec>,
    /// Revisions of the other pools owning records in `steps`, plus spawn targets.
    pub peers: IndexMap<Id, Rev>,
}

impl Cfg {
    pub fn rev_of(&self, pool_id: Id) -> Option<Rev> {
        if pool_id == self.pool_id {
            Some(self.rev)
        } else {
            self.peers.get(&pool_id).copied()
        }
    }

    /// The continuation this process left pending, if any. A process with
    /// one is suspended until its dual serves it.
    pub fn waiting(&self) -> Option<&SvcRec> {
        self.steps.values().find_map(|rec| match rec {
            SemRec::Svc(svc) if svc.proc_id == self.proc_id => Some(svc),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcRec {
    pub id: Id,
    pub pool_id: Id,
    pub sig_id: Id,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRec {
    pub id: Id,
    pub title: Option<QualSym>,
    pub sup: Option<Id>,
    pub rev: Rev,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    #[serde(default)]
    pub title: Option<QualSym>,
    #[serde(default)]
    pub sup: Option<Id>,
}

/// A pool with its direct subordinates and the process currently liable for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnap {
    pub pool: PoolRec,
    pub subs: Vec<PoolRec>,
    pub liable: Option<Id>,
}

/// Which process is liable for a pool, signed like bindings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liab {
    pub pool_id: Id,
    pub proc_id: Id,
    pub rev: i64,
}

/// Expected revision of a pool; the commit fails unless it still matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub pool_id: Id,
    pub rev: Rev,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOp {
    /// Requires the channel to carry no record.
    Put(SemRec),
    /// Requires the channel to carry a record.
    Take(Id),
}

/// Everything one transition changes, committed atomically or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    pub locks: Vec<Lock>,
    pub bnds: Vec<Bnd>,
    pub steps: Vec<StepOp>,
    pub liabs: Vec<Liab>,
    pub procs: Vec<ProcRec>,
    pub pools: Vec<PoolRec>,
    /// Continuation channels whose provider is not the pool their other
    /// holders recorded; every live binding of them is moved to this endpoint.
    #[serde(default)]
    pub homes: Vec<EP>,
}

impl Mod {
    pub fn lock(&mut self, pool_id: Id, rev: Rev) {
        if !self.locks.iter().any(|lock| lock.pool_id == pool_id) {
            self.locks.push(Lock { pool_id, rev });
        }
    }

    /// Revision the commit will leave `pool_id` at.
    pub fn stamp(&self, pool_id: Id) -> Option<Rev> {
        if let Some(lock) = self.locks.iter().find(|lock| lock.pool_id == pool_id) {
            return Some(lock.rev.next());
        }
        self.pools
            .iter()
            .find(|pool| pool.id == pool_id)
            .map(|pool| pool.rev)
    }
}

/// One submitted term: which process acts, in which pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub pool_id: Id,
    pub proc_id: Id,
    pub term: Term,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub pool_id: Id,
    pub sig_id: Id,
    /// Existing channels bound to the declaration's reception placeholders.
    #[serde(default)]
    pub values: IndexMap<Sym, Id>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRef {
    pub proc_id: Id,
    pub pool_id: Id,
    /// The channel the process provides.
    pub chnl_id: Id,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSpec {
    pub pool_id: Id,
}

/// Read-only projection of a process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcSnap {
    pub proc_id: Id,
    pub pool_id: Id,
    pub sig_id: Id,
    pub rev: Rev,
    pub chnls: IndexMap<Sym, EP>,
    pub steps: Vec<SemRec>,
}

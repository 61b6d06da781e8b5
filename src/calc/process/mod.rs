pub mod sig;
pub mod state;
pub mod term;

pub use sig::{EndpointSpec, ProcDecl, SigRef, SigSpec};
pub use state::{
    Bnd, Cfg, Cont, FwdRec, Liab, Lock, Mod, MsgRec, PollSpec, PoolRec, PoolSnap, PoolSpec,
    ProcRec, ProcSnap, ProcessRef, ProcessSpec, SemRec, StepOp, StepSpec, SvcRec, Value, EP,
};
pub use term::{Operation, Term};

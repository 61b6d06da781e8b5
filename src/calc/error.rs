use crate::calc::names::{Id, QualSym, Rev, Sym};
use crate::calc::process::term::Operation;
use crate::calc::process::StepSpec;
use crate::calc::types::Connective;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What kind of thing an error talks about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Type,
    TypeTerm,
    Sig,
    Proc,
    Pool,
    Chnl,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Type => "type",
            Self::TypeTerm => "type term",
            Self::Sig => "process declaration",
            Self::Proc => "process",
            Self::Pool => "pool",
            Self::Chnl => "channel",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Provider,
    Client,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => write!(f, "provider"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Coarse classification callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StructuralMismatch,
    MissingBinding,
    ArityMismatch,
    OptimisticConflict,
    NotFound,
    Duplicate,
    Fault,
}

#[derive(Clone, Debug, Error, Diagnostic)]
pub enum Error {
    #[error("`{op}` cannot be performed by a {side} of a `{found}` channel")]
    #[diagnostic(code(sepulka::structural_mismatch))]
    StructuralMismatch {
        op: Operation,
        side: Side,
        found: Connective,
    },

    #[error("this type was required:\n\n  {want}\n\nbut an incompatible type was provided:\n\n  {got}")]
    #[diagnostic(code(sepulka::type_mismatch))]
    TypeMismatch { want: String, got: String },

    #[error("placeholder `{0}` is not bound")]
    #[diagnostic(code(sepulka::missing_binding))]
    MissingBinding(Sym),

    #[error("cannot re-bind `{0}` before handling it")]
    #[diagnostic(code(sepulka::shadowed_binding))]
    ShadowedBinding(Sym),

    #[error("cannot end this process before handling {}", list(.0))]
    #[diagnostic(code(sepulka::unfulfilled_obligations))]
    UnfulfilledObligations(Vec<Sym>),

    #[error("label `{0}` is not offered")]
    #[diagnostic(code(sepulka::missing_label))]
    MissingLabel(Sym),

    #[error("{what}: {want} required, but {got} provided")]
    #[diagnostic(code(sepulka::arity_mismatch))]
    ArityMismatch {
        what: &'static str,
        want: usize,
        got: usize,
    },

    #[error("branches do not match the offered labels (missing: {}; redundant: {})", list(.missing), list(.redundant))]
    #[diagnostic(code(sepulka::branch_mismatch))]
    BranchMismatch { missing: Vec<Sym>, redundant: Vec<Sym> },

    #[error("{entity} {id} was expected at {expected}, but it is at {actual}")]
    #[diagnostic(
        code(sepulka::optimistic_conflict),
        help("re-read the current state and submit the step again")
    )]
    OptimisticConflict {
        entity: Entity,
        id: Id,
        expected: Rev,
        actual: Rev,
    },

    #[error("pending record on channel {0} changed concurrently")]
    #[diagnostic(
        code(sepulka::record_conflict),
        help("re-read the current state and submit the step again")
    )]
    RecordConflict(Id),

    #[error("{0} `{1}` not found")]
    #[diagnostic(code(sepulka::not_found))]
    NotFound(Entity, String),

    #[error("{0} `{1}` is already defined")]
    #[diagnostic(code(sepulka::already_defined))]
    AlreadyDefined(Entity, String),

    #[error("type `{0}` is declared, but is missing a definition")]
    #[diagnostic(code(sepulka::typeless))]
    Typeless(QualSym),

    #[error("type `{0}` is an alias of itself")]
    #[diagnostic(code(sepulka::link_cycle))]
    LinkCycle(QualSym),

    #[error("channel {0} already has a client")]
    #[diagnostic(code(sepulka::held))]
    Held(Id),

    #[error("process {proc} does not act in pool {pool}")]
    #[diagnostic(code(sepulka::foreign_process))]
    ForeignProcess { proc: Id, pool: Id },

    #[error("channel {chnl} cannot be held inside its provider pool {pool}")]
    #[diagnostic(code(sepulka::pool_loop))]
    PoolLoop { chnl: Id, pool: Id },

    #[error("found {found} where {want} was expected")]
    #[diagnostic(
        code(sepulka::unexpected_variant),
        help("stored state disagrees with the checked protocol; this is a bug")
    )]
    UnexpectedVariant {
        want: &'static str,
        found: &'static str,
    },

    #[error("process {proc} waits on channel {chnl} and takes no other step until it is served")]
    #[diagnostic(code(sepulka::suspended))]
    Suspended { proc: Id, chnl: Id },

    #[error("step chain exceeded the limit of {0} steps")]
    #[diagnostic(code(sepulka::step_limit))]
    StepLimit(usize),

    #[error("step chain stopped after {taken} committed steps: {source}")]
    #[diagnostic(
        code(sepulka::interrupted),
        help("submit `pending` to carry on where the chain stopped")
    )]
    Interrupted {
        taken: usize,
        pending: Box<StepSpec>,
        #[source]
        source: Box<Error>,
    },
}

fn list(names: &[Sym]) -> String {
    if names.is_empty() {
        return "none".to_owned();
    }
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == 0 {
                format!("`{}`", name)
            } else {
                format!(", `{}`", name)
            }
        })
        .collect()
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StructuralMismatch { .. }
            | Self::TypeMismatch { .. }
            | Self::ShadowedBinding(_)
            | Self::UnfulfilledObligations(_)
            | Self::LinkCycle(_)
            | Self::PoolLoop { .. } => ErrorKind::StructuralMismatch,

            Self::MissingBinding(_) | Self::Typeless(_) | Self::ForeignProcess { .. } => {
                ErrorKind::MissingBinding
            }

            Self::MissingLabel(_) | Self::ArityMismatch { .. } | Self::BranchMismatch { .. } => {
                ErrorKind::ArityMismatch
            }

            Self::OptimisticConflict { .. } | Self::RecordConflict(_) => {
                ErrorKind::OptimisticConflict
            }

            Self::NotFound(_, _) => ErrorKind::NotFound,
            Self::AlreadyDefined(_, _) | Self::Held(_) | Self::Suspended { .. } => {
                ErrorKind::Duplicate
            }
            Self::UnexpectedVariant { .. } | Self::StepLimit(_) => ErrorKind::Fault,
            Self::Interrupted { source, .. } => source.kind(),
        }
    }

    /// Only a lost compare-and-swap is worth resubmitting. For an interrupted
    /// chain that means resubmitting its pending step, not the original one.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::OptimisticConflict
    }

    pub fn to_report(&self) -> miette::Report {
        miette::Report::new(self.clone())
    }

    pub(crate) fn not_found(entity: Entity, what: impl fmt::Display) -> Self {
        Self::NotFound(entity, what.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = Error::OptimisticConflict {
            entity: Entity::Pool,
            id: Id::new(),
            expected: Rev::initial(),
            actual: Rev::initial().next(),
        };
        assert!(conflict.is_retryable());
        assert!(Error::RecordConflict(Id::new()).is_retryable());
        assert!(!Error::MissingBinding(Sym::from("x")).is_retryable());

        let interrupted = Error::Interrupted {
            taken: 2,
            pending: Box::new(StepSpec {
                pool_id: Id::new(),
                proc_id: Id::new(),
                term: crate::calc::process::Term::close("x"),
            }),
            source: Box::new(conflict),
        };
        assert!(interrupted.is_retryable());
        assert_eq!(interrupted.kind(), ErrorKind::OptimisticConflict);
        assert_eq!(
            Error::UnexpectedVariant {
                want: "service",
                found: "message"
            }
            .kind(),
            ErrorKind::Fault
        );
    }

    #[test]
    fn obligations_are_listed_in_the_message() {
        let error = Error::UnfulfilledObligations(vec![Sym::from("a"), Sym::from("b")]);
        assert_eq!(
            error.to_string(),
            "cannot end this process before handling `a`, `b`"
        );
        let error = Error::BranchMismatch {
            missing: vec![Sym::from("left")],
            redundant: vec![],
        };
        assert_eq!(
            error.to_string(),
            "branches do not match the offered labels (missing: `left`; redundant: none)"
        );
    }
}

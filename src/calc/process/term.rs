use crate::calc::names::{Id, Sym};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Process behavior: what a process does next on one of its channels.
///
/// Terms without a continuation (`Close`, `Send`, `Lab`, `Fwd`, `Acquire`,
/// `Detach`) end the current step. The process submits its next term once
/// it has one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Close {
        via: Sym,
    },
    Wait {
        via: Sym,
        cont: Box<Term>,
    },
    Send {
        via: Sym,
        value: Sym,
    },
    Recv {
        via: Sym,
        value: Sym,
        cont: Box<Term>,
    },
    Lab {
        via: Sym,
        label: Sym,
    },
    Case {
        via: Sym,
        conts: BTreeMap<Sym, Term>,
    },
    Fwd {
        via: Sym,
        target: Sym,
    },
    /// Spawns an instance of `sig` into a fresh sub-pool of the acting pool.
    Call {
        via: Sym,
        sig: Id,
        values: Vec<Sym>,
        cont: Box<Term>,
    },
    /// Spawns an instance of `sig` into the existing pool `pool`.
    Spawn {
        via: Sym,
        sig: Id,
        values: Vec<Sym>,
        pool: Id,
        cont: Box<Term>,
    },
    Acquire {
        via: Sym,
    },
    Accept {
        via: Sym,
        cont: Box<Term>,
    },
    Detach {
        via: Sym,
    },
    Release {
        via: Sym,
        cont: Box<Term>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Close,
    Wait,
    Send,
    Recv,
    Lab,
    Case,
    Fwd,
    Call,
    Spawn,
    Acquire,
    Accept,
    Detach,
    Release,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Close => "close",
            Self::Wait => "wait",
            Self::Send => "send",
            Self::Recv => "recv",
            Self::Lab => "lab",
            Self::Case => "case",
            Self::Fwd => "fwd",
            Self::Call => "call",
            Self::Spawn => "spawn",
            Self::Acquire => "acquire",
            Self::Accept => "accept",
            Self::Detach => "detach",
            Self::Release => "release",
        };
        write!(f, "{}", name)
    }
}

#[allow(unused)]
impl Term {
    pub fn close(via: &str) -> Self {
        Self::Close { via: via.into() }
    }

    pub fn wait(via: &str, cont: Self) -> Self {
        Self::Wait {
            via: via.into(),
            cont: Box::new(cont),
        }
    }

    pub fn send(via: &str, value: &str) -> Self {
        Self::Send {
            via: via.into(),
            value: value.into(),
        }
    }

    pub fn recv(via: &str, value: &str, cont: Self) -> Self {
        Self::Recv {
            via: via.into(),
            value: value.into(),
            cont: Box::new(cont),
        }
    }

    pub fn lab(via: &str, label: &str) -> Self {
        Self::Lab {
            via: via.into(),
            label: label.into(),
        }
    }

    pub fn case(via: &str, conts: Vec<(&str, Self)>) -> Self {
        Self::Case {
            via: via.into(),
            conts: conts
                .into_iter()
                .map(|(label, cont)| (Sym::from(label), cont))
                .collect(),
        }
    }

    pub fn fwd(via: &str, target: &str) -> Self {
        Self::Fwd {
            via: via.into(),
            target: target.into(),
        }
    }

    pub fn call(via: &str, sig: Id, values: Vec<&str>, cont: Self) -> Self {
        Self::Call {
            via: via.into(),
            sig,
            values: values.into_iter().map(Sym::from).collect(),
            cont: Box::new(cont),
        }
    }

    pub fn spawn(via: &str, sig: Id, values: Vec<&str>, pool: Id, cont: Self) -> Self {
        Self::Spawn {
            via: via.into(),
            sig,
            values: values.into_iter().map(Sym::from).collect(),
            pool,
            cont: Box::new(cont),
        }
    }

    pub fn acquire(via: &str) -> Self {
        Self::Acquire { via: via.into() }
    }

    pub fn accept(via: &str, cont: Self) -> Self {
        Self::Accept {
            via: via.into(),
            cont: Box::new(cont),
        }
    }

    pub fn detach(via: &str) -> Self {
        Self::Detach { via: via.into() }
    }

    pub fn release(via: &str, cont: Self) -> Self {
        Self::Release {
            via: via.into(),
            cont: Box::new(cont),
        }
    }
}

impl Term {
    /// The placeholder this term acts on.
    pub fn via(&self) -> &Sym {
        match self {
            Self::Close { via }
            | Self::Wait { via, .. }
            | Self::Send { via, .. }
            | Self::Recv { via, .. }
            | Self::Lab { via, .. }
            | Self::Case { via, .. }
            | Self::Fwd { via, .. }
            | Self::Call { via, .. }
            | Self::Spawn { via, .. }
            | Self::Acquire { via }
            | Self::Accept { via, .. }
            | Self::Detach { via }
            | Self::Release { via, .. } => via,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Close { .. } => Operation::Close,
            Self::Wait { .. } => Operation::Wait,
            Self::Send { .. } => Operation::Send,
            Self::Recv { .. } => Operation::Recv,
            Self::Lab { .. } => Operation::Lab,
            Self::Case { .. } => Operation::Case,
            Self::Fwd { .. } => Operation::Fwd,
            Self::Call { .. } => Operation::Call,
            Self::Spawn { .. } => Operation::Spawn,
            Self::Acquire { .. } => Operation::Acquire,
            Self::Accept { .. } => Operation::Accept,
            Self::Detach { .. } => Operation::Detach,
            Self::Release { .. } => Operation::Release,
        }
    }

    /// Process declarations referenced anywhere in this term.
    pub fn sigs(&self) -> Vec<Id> {
        fn inner(term: &Term, sigs: &mut Vec<Id>) {
            match term {
                Term::Close { .. }
                | Term::Send { .. }
                | Term::Lab { .. }
                | Term::Fwd { .. }
                | Term::Acquire { .. }
                | Term::Detach { .. } => {}
                Term::Wait { cont, .. }
                | Term::Recv { cont, .. }
                | Term::Accept { cont, .. }
                | Term::Release { cont, .. } => inner(cont, sigs),
                Term::Case { conts, .. } => {
                    for cont in conts.values() {
                        inner(cont, sigs);
                    }
                }
                Term::Call { sig, cont, .. } | Term::Spawn { sig, cont, .. } => {
                    if !sigs.contains(sig) {
                        sigs.push(*sig);
                    }
                    inner(cont, sigs);
                }
            }
        }

        let mut sigs = Vec::new();
        inner(self, &mut sigs);
        sigs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigs_are_collected_through_continuations() {
        let (a, b) = (Id::new(), Id::new());
        let term = Term::wait(
            "x",
            Term::case(
                "y",
                vec![
                    ("left", Term::call("z", a, vec![], Term::close("self"))),
                    ("right", Term::spawn("z", b, vec!["w"], Id::new(), Term::close("self"))),
                ],
            ),
        );
        assert_eq!(term.sigs(), vec![a, b]);
        assert_eq!(term.via().as_str(), "x");
        assert_eq!(term.operation(), Operation::Wait);
    }

    #[test]
    fn terms_read_from_json() {
        let term: Term = serde_json::from_str(
            r#"{"wait": {"via": "y", "cont": {"close": {"via": "self"}}}}"#,
        )
        .unwrap();
        assert_eq!(term, Term::wait("y", Term::close("self")));
    }
}

use super::core::TypeSpec;
use crate::calc::process::Term;
use std::fmt::{self, Display, Write};

impl TypeSpec {
    pub fn pretty(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::One => write!(f, "1"),
            Self::Link(name) => write!(f, "{}", name),
            Self::Tensor(value, cont) => {
                write!(f, "(")?;
                value.pretty(f)?;
                write!(f, " * ")?;
                cont.pretty(f)?;
                write!(f, ")")
            }
            Self::Lolli(value, cont) => {
                write!(f, "(")?;
                value.pretty(f)?;
                write!(f, " -o ")?;
                cont.pretty(f)?;
                write!(f, ")")
            }
            Self::Plus(choices) | Self::With(choices) => {
                let sign = if matches!(self, Self::Plus(_)) { "+" } else { "&" };
                write!(f, "{}{{", sign)?;
                for (i, (label, typ)) in choices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", label)?;
                    typ.pretty(f)?;
                }
                write!(f, "}}")
            }
            Self::Up(cont) => {
                write!(f, "up ")?;
                cont.pretty(f)
            }
            Self::Down(cont) => {
                write!(f, "down ")?;
                cont.pretty(f)
            }
        }
    }
}

impl Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        self.pretty(&mut buf)?;
        write!(f, "{}", buf)
    }
}

impl Term {
    pub fn pretty(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::Close { via } => write!(f, "close {}", via),
            Self::Wait { via, cont } => {
                write!(f, "wait {}; ", via)?;
                cont.pretty(f)
            }
            Self::Send { via, value } => write!(f, "send {}({})", via, value),
            Self::Recv { via, value, cont } => {
                write!(f, "recv {}({}); ", via, value)?;
                cont.pretty(f)
            }
            Self::Lab { via, label } => write!(f, "{}.{}", via, label),
            Self::Case { via, conts } => {
                write!(f, "case {} {{", via)?;
                for (i, (label, cont)) in conts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} => ", label)?;
                    cont.pretty(f)?;
                }
                write!(f, " }}")
            }
            Self::Fwd { via, target } => write!(f, "fwd {} {}", via, target),
            Self::Call {
                via,
                sig,
                values,
                cont,
            } => {
                write!(f, "call {} <- {}(", via, sig)?;
                write_list(f, values)?;
                write!(f, "); ")?;
                cont.pretty(f)
            }
            Self::Spawn {
                via,
                sig,
                values,
                pool,
                cont,
            } => {
                write!(f, "spawn {} <- {}(", via, sig)?;
                write_list(f, values)?;
                write!(f, ") @{}; ", pool)?;
                cont.pretty(f)
            }
            Self::Acquire { via } => write!(f, "acquire {}", via),
            Self::Accept { via, cont } => {
                write!(f, "accept {}; ", via)?;
                cont.pretty(f)
            }
            Self::Detach { via } => write!(f, "detach {}", via),
            Self::Release { via, cont } => {
                write!(f, "release {}; ", via)?;
                cont.pretty(f)
            }
        }
    }
}

fn write_list(f: &mut impl Write, items: &[impl Display]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        self.pretty(&mut buf)?;
        write!(f, "{}", buf)
    }
}

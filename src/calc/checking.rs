use super::context::{Context, Env};
use super::error::{Error, Side};
use super::names::{Id, Sym};
use super::process::{Cfg, Term};
use super::types::TypeNode;
use std::collections::BTreeMap;

/// Checks `term` as the next action of the process `cfg` describes, acting
/// from `pool_id`. Channels provided from `pool_id` are the process's
/// liabilities, the rest its assets. Returns what remains of the context.
pub fn check_state(pool_id: Id, env: &Env, cfg: &Cfg, term: &Term) -> Result<Context, Error> {
    let mut ctx = Context::from_cfg(pool_id, cfg);
    ctx.check(env, term)?;
    Ok(ctx)
}

impl Context {
    pub fn check(&mut self, env: &Env, term: &Term) -> Result<(), Error> {
        match term {
            Term::Call {
                via,
                sig,
                values,
                cont,
            }
            | Term::Spawn {
                via,
                sig,
                values,
                cont,
                ..
            } => self.check_spawn(env, via, *sig, values, cont),

            _ => match self.side_of(term.via()) {
                Some(Side::Provider) => self.check_provider(env, term),
                Some(Side::Client) => self.check_client(env, term),
                None => Err(Error::MissingBinding(term.via().clone())),
            },
        }
    }

    pub fn check_provider(&mut self, env: &Env, term: &Term) -> Result<(), Error> {
        let typ = self.take_liab(term.via())?;
        let (_, node) = env.resolve(typ)?;

        match (term, node) {
            (Term::Close { .. }, TypeNode::One) => self.cannot_have_obligations(),

            (Term::Send { via, value }, TypeNode::Tensor { value: want, cont }) => {
                self.check_value(env, value, *want)?;
                self.put(Side::Provider, via.clone(), *cont)
            }

            (
                Term::Recv {
                    via,
                    value,
                    cont: next,
                },
                TypeNode::Lolli { value: got, cont },
            ) => {
                self.put(Side::Provider, via.clone(), *cont)?;
                self.put(Side::Client, value.clone(), *got)?;
                self.check(env, next)
            }

            (Term::Lab { via, label }, TypeNode::Plus(choices)) => {
                let Some(cont) = choices.get(label) else {
                    return Err(Error::MissingLabel(label.clone()));
                };
                self.put(Side::Provider, via.clone(), *cont)
            }

            (Term::Case { via, conts }, TypeNode::With(choices)) => {
                self.check_branches(env, Side::Provider, via, choices, conts)
            }

            (Term::Fwd { target, .. }, _) => self.check_fwd(env, typ, target),

            (Term::Accept { via, cont: next }, TypeNode::Up(cont)) => {
                self.put(Side::Provider, via.clone(), *cont)?;
                self.check(env, next)
            }

            (Term::Detach { via }, TypeNode::Down(cont)) => {
                self.put(Side::Provider, via.clone(), *cont)
            }

            (term, node) => Err(Error::StructuralMismatch {
                op: term.operation(),
                side: Side::Provider,
                found: node.connective(),
            }),
        }
    }

    pub fn check_client(&mut self, env: &Env, term: &Term) -> Result<(), Error> {
        let typ = self.take_asset(term.via())?;
        let (_, node) = env.resolve(typ)?;

        match (term, node) {
            (Term::Wait { cont: next, .. }, TypeNode::One) => self.check(env, next),

            (
                Term::Recv {
                    via,
                    value,
                    cont: next,
                },
                TypeNode::Tensor { value: got, cont },
            ) => {
                self.put(Side::Client, via.clone(), *cont)?;
                self.put(Side::Client, value.clone(), *got)?;
                self.check(env, next)
            }

            (Term::Send { via, value }, TypeNode::Lolli { value: want, cont }) => {
                self.check_value(env, value, *want)?;
                self.put(Side::Client, via.clone(), *cont)
            }

            (Term::Lab { via, label }, TypeNode::With(choices)) => {
                let Some(cont) = choices.get(label) else {
                    return Err(Error::MissingLabel(label.clone()));
                };
                self.put(Side::Client, via.clone(), *cont)
            }

            (Term::Case { via, conts }, TypeNode::Plus(choices)) => {
                self.check_branches(env, Side::Client, via, choices, conts)
            }

            (Term::Acquire { via }, TypeNode::Up(cont)) => {
                self.put(Side::Client, via.clone(), *cont)
            }

            (Term::Release { via, cont: next }, TypeNode::Down(cont)) => {
                self.put(Side::Client, via.clone(), *cont)?;
                self.check(env, next)
            }

            (term, node) => Err(Error::StructuralMismatch {
                op: term.operation(),
                side: Side::Client,
                found: node.connective(),
            }),
        }
    }

    /// Consumes the asset `value`, which must have exactly the type `want`.
    fn check_value(&mut self, env: &Env, value: &Sym, want: Id) -> Result<(), Error> {
        let got = self.take_asset(value)?;
        if !env.eqtp(want, got)? {
            return Err(Error::TypeMismatch {
                want: env.show(want),
                got: env.show(got),
            });
        }
        Ok(())
    }

    fn check_branches(
        &mut self,
        env: &Env,
        side: Side,
        via: &Sym,
        choices: &BTreeMap<Sym, Id>,
        conts: &BTreeMap<Sym, Term>,
    ) -> Result<(), Error> {
        let missing: Vec<Sym> = choices
            .keys()
            .filter(|label| !conts.contains_key(*label))
            .cloned()
            .collect();
        let redundant: Vec<Sym> = conts
            .keys()
            .filter(|label| !choices.contains_key(*label))
            .cloned()
            .collect();
        if !missing.is_empty() || !redundant.is_empty() {
            return Err(Error::BranchMismatch { missing, redundant });
        }

        for (label, cont) in conts {
            let mut branch = self.clone();
            branch.put(side, via.clone(), choices[label])?;
            branch.check(env, cont)?;
        }
        Ok(())
    }

    fn check_fwd(&mut self, env: &Env, want: Id, target: &Sym) -> Result<(), Error> {
        if !self.liabs.is_empty() {
            return Err(Error::UnfulfilledObligations(
                self.liabs.keys().cloned().collect(),
            ));
        }
        let got = self.take_asset(target)?;
        self.cannot_have_obligations()?;
        if !env.eqtp(want, got)? {
            return Err(Error::TypeMismatch {
                want: env.show(want),
                got: env.show(got),
            });
        }
        Ok(())
    }

    fn check_spawn(
        &mut self,
        env: &Env,
        via: &Sym,
        sig_id: Id,
        values: &[Sym],
        cont: &Term,
    ) -> Result<(), Error> {
        let sig = env.sig(sig_id)?;
        if values.len() != sig.receptions.len() {
            return Err(Error::ArityMismatch {
                what: "reception endpoints",
                want: sig.receptions.len(),
                got: values.len(),
            });
        }
        for (value, reception) in values.iter().zip(&sig.receptions) {
            let want = env.root_of(&reception.type_name)?;
            self.check_value(env, value, want)?;
        }
        // the spawned process owes this channel; the caller holds it
        let provided = env.root_of(&sig.provision.type_name)?;
        self.put(Side::Client, via.clone(), provided)?;
        self.check(env, cont)
    }
}

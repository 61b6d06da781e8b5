use super::context::Env;
use super::error::{Entity, Error};
use super::names::{Id, Rev, Sym};
use super::process::{
    Bnd, Cfg, Cont, FwdRec, Liab, Mod, MsgRec, PoolRec, ProcRec, SemRec, StepOp, StepSpec,
    SvcRec, Term, Value, EP,
};
use super::types::{Polarity, TypeNode};

/// Computes the transition `term` makes from `cfg`.
///
/// Returns the changes to commit and, when a rendezvous completed or the
/// term has a continuation of its own, the step to take next. `None` means
/// the acting side is now persisted as a pending record and waits for its
/// dual. `term` is expected to have passed the checker against the same
/// `cfg`; stored records that disagree with it are reported as faults.
pub fn take_with(env: &Env, cfg: &Cfg, term: &Term) -> Result<(Option<StepSpec>, Mod), Error> {
    let mut step = Step {
        env,
        cfg,
        m: Mod::default(),
    };
    step.stamp(cfg.pool_id)?;
    let next = step.take(term)?;
    Ok((next, step.m))
}

struct Step<'a> {
    env: &'a Env,
    cfg: &'a Cfg,
    m: Mod,
}

impl<'a> Step<'a> {
    fn take(&mut self, term: &Term) -> Result<Option<StepSpec>, Error> {
        let env = self.env;
        match term {
            Term::Close { via } => {
                let ep = self.chnl(via)?;
                self.unbind(via, ep)?;
                self.produce(ep, Value::Close)
            }

            Term::Send { via, value } => {
                let ep = self.chnl(via)?;
                let cont = match env.resolve(ep.type_id)?.1 {
                    TypeNode::Tensor { cont, .. } | TypeNode::Lolli { cont, .. } => *cont,
                    node => return Err(unexpected("tensor or lolli", node)),
                };
                let value_ep = self.chnl(value)?;
                self.unbind(value, value_ep)?;
                let cont = self.advance(via, ep, cont)?;
                self.produce(
                    ep,
                    Value::Send {
                        value: value_ep,
                        cont,
                    },
                )
            }

            Term::Lab { via, label } => {
                let ep = self.chnl(via)?;
                let cont = match env.resolve(ep.type_id)?.1 {
                    TypeNode::Plus(choices) | TypeNode::With(choices) => choices
                        .get(label)
                        .copied()
                        .ok_or_else(|| Error::MissingLabel(label.clone()))?,
                    node => return Err(unexpected("plus or with", node)),
                };
                let cont = self.advance(via, ep, cont)?;
                self.produce(
                    ep,
                    Value::Lab {
                        label: label.clone(),
                        cont,
                    },
                )
            }

            Term::Acquire { via } => {
                let ep = self.chnl(via)?;
                let cont = match env.resolve(ep.type_id)?.1 {
                    TypeNode::Up(cont) => *cont,
                    node => return Err(unexpected("up", node)),
                };
                let cont = self.advance(via, ep, cont)?;
                self.produce(ep, Value::Acquire { cont })
            }

            Term::Detach { via } => {
                let ep = self.chnl(via)?;
                let cont = match env.resolve(ep.type_id)?.1 {
                    TypeNode::Down(cont) => *cont,
                    node => return Err(unexpected("down", node)),
                };
                let cont = self.advance(via, ep, cont)?;
                self.produce(ep, Value::Detach { cont })
            }

            Term::Wait { via, cont } => self.consume(
                via,
                Cont::Wait {
                    cont: cont.as_ref().clone(),
                },
            ),
            Term::Recv { via, value, cont } => self.consume(
                via,
                Cont::Recv {
                    value: value.clone(),
                    cont: cont.as_ref().clone(),
                },
            ),
            Term::Case { via, conts } => self.consume(
                via,
                Cont::Case {
                    conts: conts.clone(),
                },
            ),
            Term::Accept { via, cont } => self.consume(
                via,
                Cont::Accept {
                    cont: cont.as_ref().clone(),
                },
            ),
            Term::Release { via, cont } => self.consume(
                via,
                Cont::Release {
                    cont: cont.as_ref().clone(),
                },
            ),

            Term::Fwd { via, target } => self.forward(via, target),

            Term::Call {
                via,
                sig,
                values,
                cont,
            } => {
                let pool = PoolRec {
                    id: Id::new(),
                    title: None,
                    sup: Some(self.cfg.pool_id),
                    rev: Rev::initial(),
                };
                let pool_id = pool.id;
                self.m.pools.push(pool);
                self.spawn(via, *sig, values, pool_id, cont)
            }

            Term::Spawn {
                via,
                sig,
                values,
                pool,
                cont,
            } => self.spawn(via, *sig, values, *pool, cont),
        }
    }

    /// Persists a value for the other side, or hands it to a waiting consumer.
    fn produce(&mut self, ep: EP, val: Value) -> Result<Option<StepSpec>, Error> {
        let (chnl_id, rec) = self.land(ep.chnl_id)?;
        let msg = MsgRec {
            chnl_id,
            pool_id: self.cfg.pool_id,
            proc_id: self.cfg.proc_id,
            val,
        };
        match rec {
            None => {
                tracing::debug!(chnl = %chnl_id, val = msg.val.name(), "message pending");
                self.m.steps.push(StepOp::Put(SemRec::Msg(msg)));
                Ok(None)
            }
            Some(SemRec::Svc(svc)) => {
                self.m.steps.push(StepOp::Take(chnl_id));
                self.complete(&msg, &svc).map(Some)
            }
            Some(other) => Err(Error::UnexpectedVariant {
                want: "service",
                found: other.kind(),
            }),
        }
    }

    /// Persists a continuation waiting for a value, or consumes one already sent.
    fn consume(&mut self, via: &Sym, cont: Cont) -> Result<Option<StepSpec>, Error> {
        let ep = self.chnl(via)?;
        let (chnl_id, rec) = self.land(ep.chnl_id)?;
        let svc = SvcRec {
            chnl_id,
            pool_id: self.cfg.pool_id,
            proc_id: self.cfg.proc_id,
            via: via.clone(),
            ep,
            cont,
        };
        match rec {
            None => {
                tracing::debug!(chnl = %chnl_id, cont = svc.cont.name(), "service pending");
                self.m.steps.push(StepOp::Put(SemRec::Svc(svc)));
                Ok(None)
            }
            Some(SemRec::Msg(msg)) => {
                self.m.steps.push(StepOp::Take(chnl_id));
                self.complete(&msg, &svc).map(Some)
            }
            Some(other) => Err(Error::UnexpectedVariant {
                want: "message",
                found: other.kind(),
            }),
        }
    }

    /// Matches a value with its consumer. The consumer gets rebound and its
    /// continuation is what runs next.
    fn complete(&mut self, msg: &MsgRec, svc: &SvcRec) -> Result<StepSpec, Error> {
        let (proc_id, pool_id) = (svc.proc_id, svc.pool_id);
        self.unbind_for(proc_id, pool_id, &svc.via, svc.ep)?;

        let term = match (&msg.val, &svc.cont) {
            (Value::Close, Cont::Wait { cont }) => cont.clone(),

            (Value::Send { value, cont: next }, Cont::Recv { value: ph, cont }) => {
                if value.pool_id == pool_id {
                    return Err(Error::PoolLoop {
                        chnl: value.chnl_id,
                        pool: pool_id,
                    });
                }
                let next = self.rehome(svc, *next);
                self.bind_for(proc_id, pool_id, &svc.via, next)?;
                self.bind_for(proc_id, pool_id, ph, *value)?;
                cont.clone()
            }

            (Value::Lab { label, cont: next }, Cont::Case { conts }) => {
                let cont = conts
                    .get(label)
                    .ok_or_else(|| Error::MissingLabel(label.clone()))?;
                let next = self.rehome(svc, *next);
                self.bind_for(proc_id, pool_id, &svc.via, next)?;
                cont.clone()
            }

            (Value::Acquire { cont: next }, Cont::Accept { cont })
            | (Value::Detach { cont: next }, Cont::Release { cont }) => {
                let next = self.rehome(svc, *next);
                self.bind_for(proc_id, pool_id, &svc.via, next)?;
                cont.clone()
            }

            (val, cont) => {
                return Err(Error::UnexpectedVariant {
                    want: expected_value(cont),
                    found: val.name(),
                })
            }
        };

        tracing::debug!(
            chnl = %msg.chnl_id,
            val = msg.val.name(),
            consumer = %proc_id,
            "rendezvous"
        );
        Ok(StepSpec {
            pool_id,
            proc_id,
            term,
        })
    }

    /// The continuation as the consumer binds it. When a forward put a
    /// different provider behind it than the producer recorded, the producer
    /// side is moved over too.
    fn rehome(&mut self, svc: &SvcRec, next: EP) -> EP {
        let home = continued(svc, next);
        if home.pool_id != next.pool_id {
            tracing::debug!(chnl = %home.chnl_id, pool = %home.pool_id, "continuation rehomed");
            self.m.homes.push(home);
        }
        home
    }

    /// Connects the client of `via` with the provider of `target`.
    fn forward(&mut self, via: &Sym, target: &Sym) -> Result<Option<StepSpec>, Error> {
        let x = self.chnl(via)?;
        let y = self.chnl(target)?;
        self.unbind(via, x)?;
        self.unbind(target, y)?;

        let (x_star, rx) = self.land(x.chnl_id)?;
        let Some(ry) = self.cfg.steps.get(&y.chnl_id).cloned() else {
            self.m.steps.push(StepOp::Put(SemRec::Fwd(FwdRec {
                chnl_id: y.chnl_id,
                pool_id: self.cfg.pool_id,
                proc_id: self.cfg.proc_id,
                target: x_star,
            })));
            return Ok(None);
        };

        // the provider of `target` may only have acted in its own direction
        let polarity = self.env.resolve(y.type_id)?.1.polarity();
        match (polarity, &ry) {
            (Polarity::Pos, SemRec::Msg(_)) | (Polarity::Neg, SemRec::Svc(_)) => {}
            _ => {
                return Err(Error::UnexpectedVariant {
                    want: match polarity {
                        Polarity::Pos => "message",
                        _ => "service",
                    },
                    found: ry.kind(),
                })
            }
        }
        self.m.steps.push(StepOp::Take(y.chnl_id));

        match (ry, rx) {
            (ry, None) => {
                self.m.steps.push(StepOp::Put(ry.moved_to(x_star)));
                Ok(None)
            }
            (SemRec::Msg(msg), Some(SemRec::Svc(svc)))
            | (SemRec::Svc(svc), Some(SemRec::Msg(msg))) => {
                self.m.steps.push(StepOp::Take(x_star));
                self.complete(&msg, &svc).map(Some)
            }
            (ry, Some(rx)) => Err(Error::UnexpectedVariant {
                want: match ry {
                    SemRec::Msg(_) => "service",
                    _ => "message",
                },
                found: rx.kind(),
            }),
        }
    }

    fn spawn(
        &mut self,
        via: &Sym,
        sig_id: Id,
        values: &[Sym],
        pool_id: Id,
        cont: &Term,
    ) -> Result<Option<StepSpec>, Error> {
        let env = self.env;
        let sig = env.sig(sig_id)?;
        if values.len() != sig.receptions.len() {
            return Err(Error::ArityMismatch {
                what: "reception endpoints",
                want: sig.receptions.len(),
                got: values.len(),
            });
        }

        let provision = EP {
            chnl_id: Id::new(),
            type_id: env.root_of(&sig.provision.type_name)?,
            pool_id,
        };
        if pool_id == self.cfg.pool_id {
            return Err(Error::PoolLoop {
                chnl: provision.chnl_id,
                pool: pool_id,
            });
        }

        let proc_id = Id::new();
        self.m.procs.push(ProcRec {
            id: proc_id,
            pool_id,
            sig_id,
        });
        let rev = self.stamp(pool_id)?;
        self.m.liabs.push(Liab {
            pool_id,
            proc_id,
            rev: rev.signed(true),
        });
        self.bind_for(proc_id, pool_id, &sig.provision.ph, provision)?;

        for (value, reception) in values.iter().zip(&sig.receptions) {
            let ep = self.chnl(value)?;
            if ep.pool_id == pool_id {
                return Err(Error::PoolLoop {
                    chnl: ep.chnl_id,
                    pool: pool_id,
                });
            }
            self.unbind(value, ep)?;
            self.bind_for(proc_id, pool_id, &reception.ph, ep)?;
        }
        self.bind(via, provision)?;

        tracing::debug!(proc = %proc_id, pool = %pool_id, sig = %sig.title, "spawned");
        Ok(Some(StepSpec {
            pool_id: self.cfg.pool_id,
            proc_id: self.cfg.proc_id,
            term: cont.clone(),
        }))
    }

    /// Follows pending forwards from `chnl_id`, consuming them, to the
    /// channel an action really lands on and the record waiting there.
    fn land(&mut self, chnl_id: Id) -> Result<(Id, Option<SemRec>), Error> {
        let mut chnl_id = chnl_id;
        for _ in 0..=self.cfg.steps.len() {
            match self.cfg.steps.get(&chnl_id) {
                Some(SemRec::Fwd(fwd)) => {
                    self.m.steps.push(StepOp::Take(chnl_id));
                    chnl_id = fwd.target;
                }
                rec => return Ok((chnl_id, rec.cloned())),
            }
        }
        Err(Error::UnexpectedVariant {
            want: "message or service",
            found: "forward",
        })
    }

    /// Moves `via` from `ep` to a fresh channel carrying `type_id`.
    fn advance(&mut self, via: &Sym, ep: EP, type_id: Id) -> Result<EP, Error> {
        let next = EP {
            chnl_id: Id::new(),
            type_id,
            pool_id: ep.pool_id,
        };
        self.unbind(via, ep)?;
        self.bind(via, next)?;
        Ok(next)
    }

    fn chnl(&self, ph: &Sym) -> Result<EP, Error> {
        self.cfg
            .chnls
            .get(ph)
            .copied()
            .ok_or_else(|| Error::MissingBinding(ph.clone()))
    }

    /// Revision the commit leaves `pool_id` at, locking the pool if needed.
    fn stamp(&mut self, pool_id: Id) -> Result<Rev, Error> {
        if let Some(rev) = self.m.stamp(pool_id) {
            return Ok(rev);
        }
        let rev = self
            .cfg
            .rev_of(pool_id)
            .ok_or_else(|| Error::not_found(Entity::Pool, pool_id))?;
        self.m.lock(pool_id, rev);
        Ok(rev.next())
    }

    fn bind(&mut self, ph: &Sym, ep: EP) -> Result<(), Error> {
        self.bind_for(self.cfg.proc_id, self.cfg.pool_id, ph, ep)
    }

    fn unbind(&mut self, ph: &Sym, ep: EP) -> Result<(), Error> {
        self.unbind_for(self.cfg.proc_id, self.cfg.pool_id, ph, ep)
    }

    fn bind_for(&mut self, proc_id: Id, pool_id: Id, ph: &Sym, ep: EP) -> Result<(), Error> {
        let rev = self.stamp(pool_id)?;
        self.m.bnds.push(Bnd {
            proc_id,
            ph: ph.clone(),
            ep,
            rev: rev.signed(true),
        });
        Ok(())
    }

    fn unbind_for(&mut self, proc_id: Id, pool_id: Id, ph: &Sym, ep: EP) -> Result<(), Error> {
        let rev = self.stamp(pool_id)?;
        self.m.bnds.push(Bnd {
            proc_id,
            ph: ph.clone(),
            ep,
            rev: rev.signed(false),
        });
        Ok(())
    }
}

/// The continuation channel as the consumer sees it. A consumer that
/// provides the channel keeps providing its continuation.
fn continued(svc: &SvcRec, next: EP) -> EP {
    if svc.ep.pool_id == svc.pool_id {
        EP {
            pool_id: svc.pool_id,
            ..next
        }
    } else {
        next
    }
}

fn expected_value(cont: &Cont) -> &'static str {
    match cont {
        Cont::Wait { .. } => "close",
        Cont::Recv { .. } => "send",
        Cont::Case { .. } => "lab",
        Cont::Accept { .. } => "acquire",
        Cont::Release { .. } => "detach",
    }
}

fn unexpected(want: &'static str, node: &TypeNode) -> Error {
    Error::UnexpectedVariant {
        want,
        found: node.connective().name(),
    }
}

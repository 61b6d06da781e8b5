//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use sepulka::calc::process::{
    EndpointSpec, PoolSpec, ProcessRef, ProcessSpec, SigSpec, StepSpec, Term,
};
use sepulka::calc::types::{TypeSpec, TypeSpecDecl};
use sepulka::calc::{Error, Id, QualSym, Sym};
use sepulka::config::EngineConfig;
use sepulka::runtime::{Engine, Services, SigService, TypeService};

pub fn name(s: &str) -> QualSym {
    QualSym::parse(s).unwrap()
}

pub fn endpoint(ph: &str, typ: &str) -> EndpointSpec {
    EndpointSpec {
        ph: Sym::from(ph),
        type_name: name(typ),
    }
}

pub struct World {
    pub services: Services,
}

impl World {
    pub fn new(config: EngineConfig) -> Self {
        let services = Services::in_memory(config);
        declare(&services.types, &services.sigs);
        Self { services }
    }

    pub fn pool(&self) -> Id {
        self.services.pools.create(PoolSpec::default()).unwrap().id
    }

    pub fn sig(&self, title: &str) -> Id {
        self.services
            .sigs
            .retrieve_all()
            .into_iter()
            .find(|sig| sig.title.as_str() == title)
            .unwrap()
            .id
    }

    pub fn create(
        &self,
        pool_id: Id,
        sig: &str,
        values: &[(&str, &ProcessRef)],
    ) -> Result<ProcessRef, Error> {
        self.services.engine.create(ProcessSpec {
            pool_id,
            sig_id: self.sig(sig),
            values: values
                .iter()
                .map(|(ph, proc)| (Sym::from(*ph), proc.chnl_id))
                .collect(),
        })
    }

    pub fn take(&self, proc: &ProcessRef, term: Term) -> Result<(), Error> {
        self.services.engine.take(StepSpec {
            pool_id: proc.pool_id,
            proc_id: proc.proc_id,
            term,
        })
    }

    pub fn spec(&self, proc: &ProcessRef, term: Term) -> StepSpec {
        StepSpec {
            pool_id: proc.pool_id,
            proc_id: proc.proc_id,
            term,
        }
    }

    /// Every bound placeholder with the type and provider pool of its channel.
    pub fn shape(&self, proc: &ProcessRef) -> Vec<(String, Id, Id)> {
        let snap = self.services.engine.retrieve(proc.proc_id).unwrap();
        let mut shape: Vec<_> = snap
            .chnls
            .iter()
            .map(|(ph, ep)| (ph.to_string(), ep.type_id, ep.pool_id))
            .collect();
        shape.sort();
        shape
    }

    /// Bound placeholders, sorted, and the number of pending records.
    pub fn state(&self, proc: &ProcessRef) -> (Vec<String>, usize) {
        let snap = self.services.engine.retrieve(proc.proc_id).unwrap();
        let mut bound: Vec<String> = snap.chnls.keys().map(|ph| ph.to_string()).collect();
        bound.sort();
        (bound, snap.steps.len())
    }
}

pub fn declare(types: &TypeService, sigs: &SigService) {
    for (title, spec) in [
        ("one-type", TypeSpec::one()),
        ("with-type", TypeSpec::with(vec![("label-1", TypeSpec::one())])),
        ("tensor-type", TypeSpec::tensor(TypeSpec::one(), TypeSpec::one())),
    ] {
        types
            .create(TypeSpecDecl {
                title: name(title),
                spec,
            })
            .unwrap();
    }
    for (title, provision, receptions) in [
        ("closer", endpoint("x", "one-type"), vec![]),
        ("waiter", endpoint("self", "one-type"), vec![endpoint("y", "one-type")]),
        ("follower", endpoint("x", "with-type"), vec![]),
        ("decider", endpoint("self", "one-type"), vec![endpoint("x", "with-type")]),
        ("sender", endpoint("x", "tensor-type"), vec![endpoint("v", "one-type")]),
        ("receiver", endpoint("self", "one-type"), vec![endpoint("x", "tensor-type")]),
        (
            "joiner",
            endpoint("self", "one-type"),
            vec![endpoint("y", "one-type"), endpoint("z", "one-type")],
        ),
        ("relay", endpoint("out", "with-type"), vec![endpoint("in", "with-type")]),
    ] {
        sigs.create(SigSpec {
            title: name(title),
            provision,
            receptions,
        })
        .unwrap();
    }
}

pub fn strs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Drives `spec` and every step it completes, resubmitting a step whenever
/// its commit loses a race.
pub fn drive(engine: &Engine, spec: StepSpec) -> usize {
    let mut retries = 0;
    let mut next = Some(spec);
    while let Some(spec) = next {
        next = loop {
            match engine.step(&spec) {
                Ok(next) => break next,
                Err(error) if error.is_retryable() => retries += 1,
                Err(error) => panic!("{} failed: {}", spec.term, error),
            }
        };
    }
    retries
}

//! Scripted runs over in-memory stores: declare types, process declarations
//! and pools, then create processes and take steps in order.
//!
//! Inside terms, a string `@name` stands for the id of the process
//! declaration or pool called `name`.

use crate::calc::error::{Error, ErrorKind};
use crate::calc::names::{Id, QualSym, Sym};
use crate::calc::process::{PollSpec, PoolSpec, ProcessRef, ProcessSpec, SigSpec, StepSpec, Term};
use crate::calc::types::TypeSpecDecl;
use crate::config::EngineConfig;
use crate::runtime::Services;
use colored::Colorize;
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub types: Vec<TypeSpecDecl>,
    #[serde(default)]
    pub sigs: Vec<SigSpec>,
    #[serde(default)]
    pub pools: Vec<PoolEntry>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
pub struct PoolEntry {
    pub name: String,
    #[serde(default)]
    pub sup: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Instantiates `sig` in `pool`; `values` binds receptions to the
    /// channels provided by earlier named processes.
    Create {
        name: String,
        pool: String,
        sig: String,
        #[serde(default)]
        values: IndexMap<Sym, String>,
    },
    Take {
        proc: String,
        term: serde_json::Value,
        /// The kind of error the step is expected to fail with.
        #[serde(default)]
        fails: Option<ErrorKind>,
    },
    /// Looks up the process liable for `pool`, naming it if `name` is given.
    Poll {
        pool: String,
        #[serde(default)]
        name: Option<String>,
    },
    Expect {
        proc: String,
        #[serde(default)]
        bound: Option<Vec<Sym>>,
        #[serde(default)]
        pending: Option<usize>,
    },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ScenarioError {
    #[error("could not read scenario: {0}")]
    #[diagnostic(code(sepulka::scenario::io))]
    Io(#[from] std::io::Error),

    #[error("invalid scenario: {0}")]
    #[diagnostic(code(sepulka::scenario::json))]
    Json(#[from] serde_json::Error),

    #[error("nothing is called `{0}`")]
    #[diagnostic(code(sepulka::scenario::unknown_name))]
    UnknownName(String),

    #[error("action {index} failed: {source}")]
    #[diagnostic(code(sepulka::scenario::action))]
    Action {
        index: usize,
        #[source]
        #[diagnostic_source]
        source: Error,
    },

    #[error("action {index}: {message}")]
    #[diagnostic(code(sepulka::scenario::expectation))]
    Expectation { index: usize, message: String },
}

/// What happened during a run, in order.
#[derive(Clone, Debug)]
pub enum Event {
    Declared { what: &'static str, name: String },
    Created { name: String, proc: ProcessRef },
    Took { proc: String, term: Term },
    Failed { proc: String, kind: ErrorKind },
    Polled { pool: String, proc: ProcessRef },
    Checked { proc: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared { what, name } => {
                write!(f, "{} {} {}", "declared".bright_blue(), what, name)
            }
            Self::Created { name, proc } => write!(
                f,
                "{} {} ({}, provides {})",
                "created".bright_green(),
                name,
                proc.proc_id,
                proc.chnl_id
            ),
            Self::Took { proc, term } => {
                write!(f, "{} {}: {}", "took".bright_green(), proc, term)
            }
            Self::Failed { proc, kind } => write!(
                f,
                "{} {}: {:?} as expected",
                "rejected".bright_yellow(),
                proc,
                kind
            ),
            Self::Polled { pool, proc } => write!(
                f,
                "{} {}: {} is liable",
                "polled".bright_blue(),
                pool,
                proc.proc_id
            ),
            Self::Checked { proc } => write!(f, "{} {}", "checked".bright_green(), proc),
        }
    }
}

pub struct Runner {
    services: Services,
    sigs: HashMap<String, Id>,
    pools: HashMap<String, Id>,
    procs: HashMap<String, ProcessRef>,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            services: Services::in_memory(config),
            sigs: HashMap::new(),
            pools: HashMap::new(),
            procs: HashMap::new(),
        }
    }

    pub fn run(
        &mut self,
        scenario: &Scenario,
        mut on_event: impl FnMut(&Event),
    ) -> Result<(), ScenarioError> {
        let setup = |source| ScenarioError::Action { index: 0, source };

        for typ in &scenario.types {
            self.services.types.create(typ.clone()).map_err(setup)?;
            on_event(&Event::Declared {
                what: "type",
                name: typ.title.to_string(),
            });
        }
        for sig in &scenario.sigs {
            let created = self.services.sigs.create(sig.clone()).map_err(setup)?;
            self.sigs.insert(created.title.to_string(), created.id);
            on_event(&Event::Declared {
                what: "process",
                name: created.title.to_string(),
            });
        }
        for entry in &scenario.pools {
            let sup = entry.sup.as_deref().map(|sup| self.pool(sup)).transpose()?;
            let pool = self
                .services
                .pools
                .create(PoolSpec {
                    title: QualSym::parse(&entry.name).ok(),
                    sup,
                })
                .map_err(setup)?;
            self.pools.insert(entry.name.clone(), pool.id);
            on_event(&Event::Declared {
                what: "pool",
                name: entry.name.clone(),
            });
        }

        for (i, action) in scenario.actions.iter().enumerate() {
            let index = i + 1;
            let event = self.act(index, action)?;
            on_event(&event);
        }
        Ok(())
    }

    fn act(&mut self, index: usize, action: &Action) -> Result<Event, ScenarioError> {
        let failed = |source| ScenarioError::Action { index, source };
        match action {
            Action::Create {
                name,
                pool,
                sig,
                values,
            } => {
                let mut chnls = IndexMap::new();
                for (ph, provider) in values {
                    chnls.insert(ph.clone(), self.named_proc(provider)?.chnl_id);
                }
                let spec = ProcessSpec {
                    pool_id: self.pool(pool)?,
                    sig_id: self.sig(sig)?,
                    values: chnls,
                };
                let proc = self.services.engine.create(spec).map_err(failed)?;
                self.procs.insert(name.clone(), proc);
                Ok(Event::Created {
                    name: name.clone(),
                    proc,
                })
            }

            Action::Take { proc, term, fails } => {
                let target = *self.named_proc(proc)?;
                let mut term = term.clone();
                self.substitute(&mut term)?;
                let term: Term = serde_json::from_value(term)?;
                let spec = StepSpec {
                    pool_id: target.pool_id,
                    proc_id: target.proc_id,
                    term: term.clone(),
                };
                match (self.services.engine.take(spec), fails) {
                    (Ok(()), None) => Ok(Event::Took {
                        proc: proc.clone(),
                        term,
                    }),
                    (Err(error), Some(kind)) if error.kind() == *kind => Ok(Event::Failed {
                        proc: proc.clone(),
                        kind: *kind,
                    }),
                    (Ok(()), Some(kind)) => Err(ScenarioError::Expectation {
                        index,
                        message: format!("expected {:?}, but `{}` succeeded", kind, term),
                    }),
                    (Err(error), _) => Err(failed(error)),
                }
            }

            Action::Poll { pool, name } => {
                let proc = self
                    .services
                    .engine
                    .poll(PollSpec {
                        pool_id: self.pool(pool)?,
                    })
                    .map_err(failed)?;
                if let Some(name) = name {
                    self.procs.insert(name.clone(), proc);
                }
                Ok(Event::Polled {
                    pool: pool.clone(),
                    proc,
                })
            }

            Action::Expect {
                proc,
                bound,
                pending,
            } => {
                let target = self.named_proc(proc)?;
                let snap = self
                    .services
                    .engine
                    .retrieve(target.proc_id)
                    .map_err(failed)?;
                if let Some(bound) = bound {
                    let mut actual: Vec<&Sym> = snap.chnls.keys().collect();
                    let mut wanted: Vec<&Sym> = bound.iter().collect();
                    actual.sort();
                    wanted.sort();
                    if actual != wanted {
                        return Err(ScenarioError::Expectation {
                            index,
                            message: format!("{} has {:?} bound, not {:?}", proc, actual, wanted),
                        });
                    }
                }
                if let Some(pending) = pending {
                    if snap.steps.len() != *pending {
                        return Err(ScenarioError::Expectation {
                            index,
                            message: format!(
                                "{} has {} pending records, not {}",
                                proc,
                                snap.steps.len(),
                                pending
                            ),
                        });
                    }
                }
                Ok(Event::Checked { proc: proc.clone() })
            }
        }
    }

    /// Replaces every `@name` string with the id it stands for.
    fn substitute(&self, value: &mut serde_json::Value) -> Result<(), ScenarioError> {
        match value {
            serde_json::Value::String(s) => {
                if let Some(name) = s.strip_prefix('@') {
                    let id = self
                        .sigs
                        .get(name)
                        .or_else(|| self.pools.get(name))
                        .ok_or_else(|| ScenarioError::UnknownName(name.to_owned()))?;
                    *value = serde_json::to_value(id)?;
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.substitute(item)?;
                }
            }
            serde_json::Value::Object(fields) => {
                for field in fields.values_mut() {
                    self.substitute(field)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn sig(&self, name: &str) -> Result<Id, ScenarioError> {
        self.sigs
            .get(name)
            .copied()
            .ok_or_else(|| ScenarioError::UnknownName(name.to_owned()))
    }

    fn pool(&self, name: &str) -> Result<Id, ScenarioError> {
        self.pools
            .get(name)
            .copied()
            .ok_or_else(|| ScenarioError::UnknownName(name.to_owned()))
    }

    fn named_proc(&self, name: &str) -> Result<&ProcessRef, ScenarioError> {
        self.procs
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownName(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_in_terms_become_ids() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "types": [{"title": "one-type", "spec": "one"}],
                "sigs": [{"title": "unit", "provision": {"ph": "x", "type": "one-type"}}],
                "pools": [{"name": "main"}],
                "actions": []
            }"#,
        )
        .unwrap();
        let mut runner = Runner::new(scenario.config);
        let mut events = vec![];
        runner.run(&scenario, |event| events.push(event.clone())).unwrap();
        assert_eq!(events.len(), 3);

        let mut term = serde_json::json!({
            "call": {"via": "z", "sig": "@unit", "values": [], "cont": {"close": {"via": "z"}}}
        });
        runner.substitute(&mut term).unwrap();
        let term: Term = serde_json::from_value(term).unwrap();
        let Term::Call { sig, .. } = term else {
            panic!("Expected a call, got {}", term);
        };
        assert_eq!(Some(&sig), runner.sigs.get("unit"));

        let mut unknown = serde_json::json!(["@nobody"]);
        assert!(matches!(
            runner.substitute(&mut unknown),
            Err(ScenarioError::UnknownName(name)) if name == "nobody"
        ));
    }
}

//! End-to-end runs of the services over the in-memory store.

mod common;

use common::{declare, strs, World};
use sepulka::calc::process::{PollSpec, PoolSpec, ProcessSpec, StepSpec, Term};
use sepulka::calc::{check_state, take_with, Env, Error, ErrorKind, Sym};
use sepulka::config::EngineConfig;
use sepulka::runtime::{Engine, PoolService, SigService, TypeService};
use sepulka::store::{MemoryStore, ProcStore};
use std::sync::Arc;

#[test]
fn close_meets_wait_in_either_order() {
    for closer_first in [true, false] {
        let world = World::new(EngineConfig::default());
        let (left, right) = (world.pool(), world.pool());
        let closer = world.create(left, "closer", &[]).unwrap();
        let waiter = world.create(right, "waiter", &[("y", &closer)]).unwrap();

        let close = Term::close("x");
        let wait = Term::wait("y", Term::close("self"));
        if closer_first {
            world.take(&closer, close).unwrap();
            assert_eq!(world.state(&waiter), (strs(&["self", "y"]), 1));
            world.take(&waiter, wait).unwrap();
        } else {
            world.take(&waiter, wait).unwrap();
            assert_eq!(world.state(&waiter), (strs(&["self", "y"]), 1));
            world.take(&closer, close).unwrap();
        }

        assert_eq!(world.state(&closer), (vec![], 0));
        assert_eq!(world.state(&waiter), (vec![], 0));
    }
}

#[test]
fn labels_pick_the_branch_of_the_follower() {
    let world = World::new(EngineConfig::default());
    let (left, right) = (world.pool(), world.pool());
    let follower = world.create(left, "follower", &[]).unwrap();
    let decider = world.create(right, "decider", &[("x", &follower)]).unwrap();

    world
        .take(
            &follower,
            Term::case("x", vec![("label-1", Term::close("x"))]),
        )
        .unwrap();
    assert_eq!(world.state(&follower), (strs(&["x"]), 1));

    let unknown = world.take(&decider, Term::lab("x", "label-2")).unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::ArityMismatch);

    world.take(&decider, Term::lab("x", "label-1")).unwrap();
    assert_eq!(world.state(&follower), (vec![], 0));
    assert_eq!(world.state(&decider), (strs(&["self", "x"]), 1));

    world
        .take(&decider, Term::wait("x", Term::close("self")))
        .unwrap();
    assert_eq!(world.state(&decider), (vec![], 0));
}

#[test]
fn received_channels_change_hands() {
    let world = World::new(EngineConfig::default());
    let (units, senders, receivers) = (world.pool(), world.pool(), world.pool());
    let unit = world.create(units, "closer", &[]).unwrap();
    let sender = world.create(senders, "sender", &[("v", &unit)]).unwrap();
    let receiver = world.create(receivers, "receiver", &[("x", &sender)]).unwrap();

    world.take(&sender, Term::send("x", "v")).unwrap();
    // the message waits on the old channel, `x` has already moved on
    assert_eq!(world.state(&sender), (strs(&["x"]), 0));

    world
        .take(
            &receiver,
            Term::recv("x", "v", Term::wait("x", Term::wait("v", Term::close("self")))),
        )
        .unwrap();
    assert_eq!(world.state(&receiver), (strs(&["self", "v", "x"]), 1));

    world.take(&sender, Term::close("x")).unwrap();
    assert_eq!(world.state(&sender), (vec![], 0));
    assert_eq!(world.state(&receiver), (strs(&["self", "v"]), 1));

    world.take(&unit, Term::close("x")).unwrap();
    assert_eq!(world.state(&receiver), (vec![], 0));
}

#[test]
fn creation_guards_the_channels_it_hands_out() {
    let world = World::new(EngineConfig::default());
    let (left, right) = (world.pool(), world.pool());
    let closer = world.create(left, "closer", &[]).unwrap();

    let looped = world.create(left, "waiter", &[("y", &closer)]).unwrap_err();
    assert!(matches!(looped, Error::PoolLoop { .. }));

    let wrong = world.create(right, "decider", &[("x", &closer)]).unwrap_err();
    assert!(matches!(wrong, Error::TypeMismatch { .. }));

    let missing = world.create(right, "waiter", &[]).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::ArityMismatch);

    world.create(right, "waiter", &[("y", &closer)]).unwrap();
    let twice = world.create(right, "waiter", &[("y", &closer)]).unwrap_err();
    assert_eq!(twice.kind(), ErrorKind::Duplicate);
}

#[test]
fn the_newest_process_is_liable_for_its_pool() {
    let world = World::new(EngineConfig::default());
    let pool = world.pool();
    let first = world.create(pool, "closer", &[]).unwrap();
    let polled = world.services.engine.poll(PollSpec { pool_id: pool }).unwrap();
    assert_eq!(polled, first);

    let second = world.create(pool, "closer", &[]).unwrap();
    let polled = world.services.engine.poll(PollSpec { pool_id: pool }).unwrap();
    assert_eq!(polled, second);

    let empty = world.pool();
    let error = world.services.engine.poll(PollSpec { pool_id: empty }).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[test]
fn steps_are_taken_only_in_the_acting_pool() {
    let world = World::new(EngineConfig::default());
    let (left, right) = (world.pool(), world.pool());
    let closer = world.create(left, "closer", &[]).unwrap();
    let error = world
        .services
        .engine
        .take(StepSpec {
            pool_id: right,
            proc_id: closer.proc_id,
            term: Term::close("x"),
        })
        .unwrap_err();
    assert!(matches!(error, Error::ForeignProcess { .. }));
    assert_eq!(world.state(&closer), (strs(&["x"]), 0));
}

#[test]
fn long_chains_stop_at_the_step_limit_and_can_be_resumed() {
    let world = World::new(EngineConfig { max_steps: 1 });
    let (left, right) = (world.pool(), world.pool());
    let closer = world.create(left, "closer", &[]).unwrap();
    let waiter = world.create(right, "waiter", &[("y", &closer)]).unwrap();

    world
        .take(&waiter, Term::wait("y", Term::close("self")))
        .unwrap();
    // the close completes the wait, whose continuation would be a second step
    let error = world.take(&closer, Term::close("x")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Fault);
    let Error::Interrupted {
        taken: 1,
        pending,
        source,
    } = &error
    else {
        panic!("Expected an interrupted chain, got {:?}", error);
    };
    assert!(matches!(**source, Error::StepLimit(1)));
    assert_eq!(pending.proc_id, waiter.proc_id);
    assert_eq!(pending.term, Term::close("self"));
    assert_eq!(world.state(&closer), (vec![], 0));
    assert_eq!(world.state(&waiter), (strs(&["self"]), 0));

    world.services.engine.take(*pending.clone()).unwrap();
    assert_eq!(world.state(&waiter), (vec![], 0));
}

#[test]
fn a_waiting_process_takes_no_other_step() {
    let world = World::new(EngineConfig::default());
    let (left, right) = (world.pool(), world.pool());
    let first = world.create(left, "closer", &[]).unwrap();
    let second = world.create(left, "closer", &[]).unwrap();
    let joiner = world
        .create(right, "joiner", &[("y", &first), ("z", &second)])
        .unwrap();

    world
        .take(&joiner, Term::wait("y", Term::wait("z", Term::close("self"))))
        .unwrap();
    let error = world
        .take(&joiner, Term::wait("z", Term::wait("y", Term::close("self"))))
        .unwrap_err();
    assert!(matches!(error, Error::Suspended { proc, .. } if proc == joiner.proc_id));
    assert_ne!(error.kind(), ErrorKind::Fault);
    assert!(!error.is_retryable());
    assert_eq!(world.state(&joiner), (strs(&["self", "y", "z"]), 1));

    // the first close resumes the joiner, which then waits on `z`
    world.take(&first, Term::close("x")).unwrap();
    assert_eq!(world.state(&first), (vec![], 0));
    assert_eq!(world.state(&joiner), (strs(&["self", "z"]), 1));

    world.take(&second, Term::close("x")).unwrap();
    assert_eq!(world.state(&second), (vec![], 0));
    assert_eq!(world.state(&joiner), (vec![], 0));
}

#[test]
fn send_and_recv_commit_the_same_bindings_in_either_order() {
    let world = World::new(EngineConfig::default());
    let (units, senders, receivers) = (world.pool(), world.pool(), world.pool());
    let x = Sym::from("x");
    let mut outcomes = vec![];

    for send_first in [true, false] {
        let unit = world.create(units, "closer", &[]).unwrap();
        let sender = world.create(senders, "sender", &[("v", &unit)]).unwrap();
        let receiver = world.create(receivers, "receiver", &[("x", &sender)]).unwrap();

        let send = Term::send("x", "v");
        let recv = Term::recv("x", "v", Term::wait("x", Term::wait("v", Term::close("self"))));
        if send_first {
            world.take(&sender, send).unwrap();
            world.take(&receiver, recv).unwrap();
        } else {
            world.take(&receiver, recv).unwrap();
            assert_eq!(world.state(&receiver), (strs(&["self", "x"]), 1));
            world.take(&sender, send).unwrap();
        }

        let (held, provided) = (
            world.services.engine.retrieve(receiver.proc_id).unwrap(),
            world.services.engine.retrieve(sender.proc_id).unwrap(),
        );
        assert_eq!(held.chnls[&x], provided.chnls[&x]);
        assert_eq!(held.chnls[&Sym::from("v")].chnl_id, unit.chnl_id);
        outcomes.push((
            world.shape(&sender),
            world.state(&sender),
            world.shape(&receiver),
            world.state(&receiver),
        ));

        world.take(&sender, Term::close("x")).unwrap();
        world.take(&unit, Term::close("x")).unwrap();
        for proc in [&unit, &sender, &receiver] {
            assert_eq!(world.state(proc), (vec![], 0));
        }
    }
    assert_eq!(outcomes[0], outcomes[1]);
}

#[test]
fn steps_derived_from_one_revision_commit_once() {
    let world = World::new(EngineConfig::default());
    let pool = world.pool();
    let first = world.create(pool, "closer", &[]).unwrap();
    let second = world.create(pool, "closer", &[]).unwrap();
    let engine = &world.services.engine;

    let (a, b) = (
        world.spec(&first, Term::close("x")),
        world.spec(&second, Term::close("x")),
    );
    let (_, ma) = engine.derive(&a).unwrap();
    let (_, mb) = engine.derive(&b).unwrap();
    assert_eq!(ma.locks, mb.locks);

    engine.commit(&a, &ma).unwrap();
    let error = engine.commit(&b, &mb).unwrap_err();
    assert!(matches!(error, Error::OptimisticConflict { .. }));
    assert_eq!(world.state(&first), (vec![], 0));
    assert_eq!(world.state(&second), (strs(&["x"]), 0));

    // derived again from the current revision, the same step goes through
    engine.step(&b).unwrap();
    assert_eq!(world.state(&second), (vec![], 0));
}

#[test]
fn stale_transitions_are_rejected_and_can_be_retried() {
    let store = Arc::new(MemoryStore::new());
    let types = TypeService::new(store.clone());
    let sigs = SigService::new(store.clone());
    let pools = PoolService::new(store.clone(), store.clone());
    let engine = Engine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        EngineConfig::default(),
    );
    declare(&types, &sigs);
    let closer_sig = sigs
        .retrieve_all()
        .into_iter()
        .find(|sig| sig.title.as_str() == "closer")
        .unwrap()
        .id;

    let pool = pools.create(PoolSpec::default()).unwrap().id;
    let create = || {
        engine
            .create(ProcessSpec {
                pool_id: pool,
                sig_id: closer_sig,
                values: Default::default(),
            })
            .unwrap()
    };
    let closer = create();

    // read a configuration, then let the pool move on before committing
    let term = Term::close("x");
    let cfg = store.select_proc(closer.proc_id).unwrap();
    let env = Env::load(store.as_ref(), &cfg, &term).unwrap();
    check_state(pool, &env, &cfg, &term).unwrap();
    let (_, m) = take_with(&env, &cfg, &term).unwrap();
    create();

    let error = store.update_proc(&m).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OptimisticConflict);
    assert!(error.is_retryable());
    assert_eq!(store.select_proc(closer.proc_id).unwrap().chnls.len(), 1);

    engine
        .take(StepSpec {
            pool_id: pool,
            proc_id: closer.proc_id,
            term,
        })
        .unwrap();
    assert!(store.select_proc(closer.proc_id).unwrap().chnls.is_empty());
}

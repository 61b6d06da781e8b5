//! Racing steps against one store: losers of a compare-and-swap retry and
//! every session still completes exactly once.

mod common;

use common::{drive, World};
use sepulka::calc::process::{ProcessRef, StepSpec, Term};
use sepulka::config::EngineConfig;
use std::thread;

const SESSIONS: usize = 8;

fn spec(proc: &ProcessRef, term: Term) -> StepSpec {
    StepSpec {
        pool_id: proc.pool_id,
        proc_id: proc.proc_id,
        term,
    }
}

#[test]
fn contended_pools_serialize_their_commits() {
    let world = World::new(EngineConfig::default());
    let (left, right) = (world.pool(), world.pool());
    let pairs: Vec<_> = (0..SESSIONS)
        .map(|_| {
            let closer = world.create(left, "closer", &[]).unwrap();
            let waiter = world.create(right, "waiter", &[("y", &closer)]).unwrap();
            (closer, waiter)
        })
        .collect();

    let engine = &world.services.engine;
    thread::scope(|s| {
        for (closer, waiter) in &pairs {
            s.spawn(move || drive(engine, spec(closer, Term::close("x"))));
            s.spawn(move || drive(engine, spec(waiter, Term::wait("y", Term::close("self")))));
        }
    });

    for (closer, waiter) in &pairs {
        assert_eq!(world.state(closer), (vec![], 0));
        assert_eq!(world.state(waiter), (vec![], 0));
    }
    // every create and every close moved the closers' pool exactly once
    let pool = world.services.pools.retrieve(left).unwrap().pool;
    assert_eq!(pool.rev.get(), 1 + 2 * SESSIONS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_in_separate_pools_run_side_by_side() {
    let world = World::new(EngineConfig::default());
    let mut sessions = vec![];
    for _ in 0..SESSIONS {
        let (left, right) = (world.pool(), world.pool());
        let follower = world.create(left, "follower", &[]).unwrap();
        let decider = world.create(right, "decider", &[("x", &follower)]).unwrap();
        sessions.push((follower, decider));
    }

    let mut handles = vec![];
    for (follower, decider) in &sessions {
        let engine = world.services.engine.clone();
        let case = spec(follower, Term::case("x", vec![("label-1", Term::close("x"))]));
        handles.push(tokio::task::spawn_blocking(move || drive(&engine, case)));

        let engine = world.services.engine.clone();
        let (lab, wait) = (
            spec(decider, Term::lab("x", "label-1")),
            spec(decider, Term::wait("x", Term::close("self"))),
        );
        handles.push(tokio::task::spawn_blocking(move || {
            drive(&engine, lab) + drive(&engine, wait)
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for (follower, decider) in &sessions {
        assert_eq!(world.state(follower), (vec![], 0));
        assert_eq!(world.state(decider), (vec![], 0));
    }
}

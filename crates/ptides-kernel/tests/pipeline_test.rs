//! End-to-end: sensor tokens flow through a two-stage pipeline and reach the
//! actuator exactly at their model timestamps.

mod common;

use common::{run_until, Relay, TestEnv};
use ptides_causality::{CausalityAnalysis, PlatformBuilder, SuperdenseDependency};
use ptides_common::{SimTime, Tag, Token};
use ptides_kernel::{Director, Scheduler, SchedulerConfig};

/// sensor -> A (1s execution, 2s model delay) -> B (instant) -> actuator
fn pipeline() -> (Director, ptides_common::PortId, ptides_common::PortId) {
    let mut b = PlatformBuilder::new();
    let sensor = b.sensor_input("sensor");

    let a = b.actor("a", SimTime::from_secs(1.0));
    let a_in = b.input_port(a, "in").unwrap();
    let a_out = b.output_port(a, "out").unwrap();
    b.set_dependency(
        a_in,
        a_out,
        SuperdenseDependency::new(SimTime::from_secs(2.0), 0),
    )
    .unwrap();

    let bb = b.actor("b", SimTime::ZERO);
    let b_in = b.input_port(bb, "in").unwrap();
    let b_out = b.output_port(bb, "out").unwrap();
    b.set_dependency(b_in, b_out, SuperdenseDependency::ZERO_DELAY)
        .unwrap();

    let act = b.actuator_output("act");
    b.connect(sensor, a_in).unwrap();
    b.connect(a_out, b_in).unwrap();
    b.connect(b_out, act).unwrap();

    let platform = b.build().unwrap();
    let analysis = CausalityAnalysis::analyze(&platform, SimTime::ZERO, true).unwrap();
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();

    let mut director = Director::new(platform, analysis, scheduler);
    director.register_actor(
        a,
        Box::new(Relay {
            out: a_out,
            delay: SimTime::from_secs(2.0),
        }),
    );
    director.register_actor(
        bb,
        Box::new(Relay {
            out: b_out,
            delay: SimTime::ZERO,
        }),
    );
    (director, sensor, act)
}

#[test]
fn tokens_arrive_on_time_in_timestamp_order() {
    let (mut director, sensor, act) = pipeline();
    let mut env = TestEnv::new();

    director
        .post_input(sensor, Token::Int(1), SimTime::ZERO)
        .unwrap();
    director
        .handle_reactivation(SimTime::ZERO, &mut env)
        .unwrap();
    run_until(&mut director, &mut env, SimTime::from_secs(4.0)).unwrap();

    director
        .post_input(sensor, Token::Int(2), SimTime::from_secs(5.0))
        .unwrap();
    director
        .handle_reactivation(SimTime::from_secs(5.0), &mut env)
        .unwrap();
    run_until(&mut director, &mut env, SimTime::from_secs(60.0)).unwrap();

    let actuations = director.take_actuations();
    assert_eq!(actuations.len(), 2);

    // Token 1: timestamped 0s at the sensor, 2s of model delay through A,
    // delivered exactly at platform 2s even though A computed for 1s.
    assert_eq!(actuations[0].port, act);
    assert_eq!(actuations[0].tag, Tag::at(SimTime::from_secs(2.0)));
    assert_eq!(actuations[0].token, Token::Int(1));
    assert_eq!(actuations[0].delivered_at, SimTime::from_secs(2.0));

    // Token 2: 5s + 2s.
    assert_eq!(actuations[1].tag, Tag::at(SimTime::from_secs(7.0)));
    assert_eq!(actuations[1].delivered_at, SimTime::from_secs(7.0));

    // Tag monotonicity at the actuator.
    assert!(actuations[0].tag < actuations[1].tag);
}

#[test]
fn device_delay_defers_observation_but_not_the_timestamp() {
    let mut b = PlatformBuilder::new();
    let sensor = b.sensor_input("sensor");
    b.set_device_delay(sensor, SimTime::from_secs(1.0), SimTime::from_secs(1.0))
        .unwrap();
    let a = b.actor("a", SimTime::ZERO);
    let a_in = b.input_port(a, "in").unwrap();
    let a_out = b.output_port(a, "out").unwrap();
    b.set_dependency(
        a_in,
        a_out,
        SuperdenseDependency::new(SimTime::from_secs(3.0), 0),
    )
    .unwrap();
    let act = b.actuator_output("act");
    b.connect(sensor, a_in).unwrap();
    b.connect(a_out, act).unwrap();
    let platform = b.build().unwrap();
    let analysis = CausalityAnalysis::analyze(&platform, SimTime::ZERO, true).unwrap();
    let mut director = Director::new(
        platform,
        analysis,
        Scheduler::new(SchedulerConfig::default()).unwrap(),
    );
    director.register_actor(
        a,
        Box::new(Relay {
            out: a_out,
            delay: SimTime::from_secs(3.0),
        }),
    );
    let mut env = TestEnv::new();

    // The token occurs at 2s but the platform only sees it at 3s; its tag
    // still says 2s.
    director
        .post_input(sensor, Token::Int(9), SimTime::from_secs(2.0))
        .unwrap();
    director
        .handle_reactivation(SimTime::from_secs(2.0), &mut env)
        .unwrap();
    run_until(&mut director, &mut env, SimTime::from_secs(30.0)).unwrap();

    let actuations = director.take_actuations();
    assert_eq!(actuations.len(), 1);
    assert_eq!(actuations[0].tag, Tag::at(SimTime::from_secs(5.0)));
    assert_eq!(actuations[0].delivered_at, SimTime::from_secs(5.0));
}

//! Shared harness for the kernel integration tests: a recording environment
//! that grants every reactivation, a driver that replays granted instants in
//! oracle order, and a couple of tiny actors.

#![allow(dead_code)]

use ptides_common::{PortId, SchedulerError, SimTime, Token};
use ptides_kernel::{Director, Environment, FiringContext, PlatformActor};
use std::collections::BTreeSet;

/// Grants every reactivation request and remembers it.
#[derive(Default)]
pub struct TestEnv {
    pending: BTreeSet<SimTime>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Environment for TestEnv {
    fn request_reactivation(&mut self, oracle_time: SimTime) -> SimTime {
        self.pending.insert(oracle_time);
        oracle_time
    }
}

/// Activate the director at every granted instant up to `horizon`,
/// in oracle order.
pub fn run_until(
    director: &mut Director,
    env: &mut TestEnv,
    horizon: SimTime,
) -> Result<(), SchedulerError> {
    while let Some(&t) = env.pending.iter().next() {
        if t > horizon {
            break;
        }
        env.pending.remove(&t);
        director.handle_reactivation(t, env)?;
    }
    Ok(())
}

/// Copies every input token to `out`, `delay` model time later.
pub struct Relay {
    pub out: PortId,
    pub delay: SimTime,
}

impl PlatformActor for Relay {
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), SchedulerError> {
        for event in ctx.events().to_vec() {
            ctx.send_delayed(self.out, event.token, self.delay)?;
        }
        Ok(())
    }
}

/// Once kicked by any event, emits a token every `period` and re-arms itself
/// with a pure event until `remaining` firings are exhausted.
pub struct Timer {
    pub out: PortId,
    pub period: SimTime,
    pub remaining: u32,
}

impl PlatformActor for Timer {
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), SchedulerError> {
        let next = ctx.tag().time + self.period;
        ctx.send_delayed(self.out, Token::Int(self.remaining as i64), self.period)?;
        if self.remaining > 0 {
            self.remaining -= 1;
            ctx.request_firing(next)?;
        }
        Ok(())
    }
}

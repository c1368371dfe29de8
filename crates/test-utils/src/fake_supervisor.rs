use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use jobctl::exec::supervisor::BoxFuture;
use jobctl::exec::{OutcomeDescriptor, UnitOutcome, UnitState, UnitSupervisor};

/// A scripted service manager:
/// - `active_state` pops the next state from a queue; once only one state is
///   left it keeps returning that one.
/// - `unit_outcome` returns a fixed outcome.
/// - `tail_command` returns a fixed argv (default: a follower that prints
///   nothing and waits to be terminated).
///
/// Every queried unit name is recorded.
#[derive(Debug, Clone)]
pub struct FakeSupervisor {
    states: Arc<Mutex<VecDeque<UnitState>>>,
    outcome: UnitOutcome,
    tail: Vec<String>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl FakeSupervisor {
    pub fn new(states: impl IntoIterator<Item = UnitState>, outcome: UnitOutcome) -> Self {
        let mut states: VecDeque<UnitState> = states.into_iter().collect();
        if states.is_empty() {
            states.push_back(UnitState::Inactive);
        }
        Self {
            states: Arc::new(Mutex::new(states)),
            outcome,
            tail: crate::sh("exec sleep 60"),
            queried: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Unit goes `active` once, then `inactive`, with a clean outcome.
    pub fn succeeding() -> Self {
        Self::new(
            [UnitState::Active, UnitState::Inactive],
            UnitOutcome::new(0, OutcomeDescriptor::Success),
        )
    }

    /// Unit goes `active` once, then `failed` with exit status `code`.
    pub fn failing(code: i32) -> Self {
        Self::new(
            [UnitState::Active, UnitState::Failed],
            UnitOutcome::new(code, OutcomeDescriptor::Other("exit-code".to_string())),
        )
    }

    pub fn with_tail(mut self, argv: Vec<String>) -> Self {
        self.tail = argv;
        self
    }

    /// Unit names passed to `active_state`, in call order.
    pub fn queried_units(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

impl UnitSupervisor for FakeSupervisor {
    fn active_state<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, UnitState> {
        Box::pin(async move {
            self.queried.lock().unwrap().push(unit.to_string());
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap()
            } else {
                states.front().cloned().unwrap()
            }
        })
    }

    fn unit_outcome<'a>(&'a self, _unit: &'a str) -> BoxFuture<'a, UnitOutcome> {
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }

    fn tail_command(&self, _unit: &str) -> Vec<String> {
        self.tail.clone()
    }
}

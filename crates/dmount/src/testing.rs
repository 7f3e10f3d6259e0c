//! Test doubles for the tool and randomness seams.

use std::collections::VecDeque;

use dmount_common::{DmountError, DmountResult};

use crate::maintenance::RandomSource;
use crate::tool::{Invocation, ProcessOutcome, ToolRunner};

enum Response {
    Outcome(ProcessOutcome),
    SpawnFailure,
}

/// Replays canned outcomes in order and records every invocation.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: VecDeque<Response>,
    calls: Vec<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next invocation.
    pub fn respond(mut self, outcome: ProcessOutcome) -> Self {
        self.responses.push_back(Response::Outcome(outcome));
        self
    }

    /// Queue a spawn failure for the next invocation.
    pub fn fail_spawn(mut self) -> Self {
        self.responses.push_back(Response::SpawnFailure);
        self
    }

    /// Program and arguments of every invocation so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.clone()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&mut self, invocation: &Invocation) -> DmountResult<ProcessOutcome> {
        let mut call = vec![invocation.tool()];
        call.extend(
            invocation
                .args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        self.calls.push(call);

        match self.responses.pop_front() {
            Some(Response::Outcome(outcome)) => Ok(outcome),
            Some(Response::SpawnFailure) => Err(DmountError::Spawn {
                tool: invocation.tool(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
            None => panic!("unexpected invocation of {}", invocation.tool()),
        }
    }
}

/// Always returns the same sample.
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

//! Shared test fixtures: scripted probes and a fake `ssh`/`ping` executor
#![allow(dead_code)]

use async_trait::async_trait;
use flashcopy_runner::external::{CommandError, CommandExecutor, CommandOutput};
use flashcopy_runner::{Probe, ProbeError, ProbeResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Returns scripted results in order, then repeats the fallback
pub struct ScriptedProbe {
    name: String,
    script: Mutex<VecDeque<Result<ProbeResult, ProbeError>>>,
    fallback: Result<ProbeResult, ProbeError>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(name: &str, script: Vec<Result<ProbeResult, ProbeError>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            fallback: Ok(ProbeResult::Flag(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn flags(name: &str, flags: &[bool]) -> Self {
        Self::new(name, flags.iter().map(|f| Ok(ProbeResult::Flag(*f))).collect())
    }

    pub fn counts(name: &str, counts: &[u64]) -> Self {
        Self::new(
            name,
            counts
                .iter()
                .map(|count| {
                    let items = (0..*count).map(|i| format!("Q{:05}", i + 1)).collect();
                    Ok(ProbeResult::Pending {
                        count: *count,
                        items,
                    })
                })
                .collect(),
        )
    }

    pub fn always_ready(name: &str) -> Self {
        let mut probe = Self::new(name, Vec::new());
        probe.fallback = Ok(ProbeResult::Flag(true));
        probe
    }

    /// Handle that keeps counting after the probe moves into a phase
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self) -> Result<ProbeResult, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn describe(&self) -> String {
        format!("scripted {}", self.name)
    }
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Fake process executor keyed on a substring of the joined argv.
/// The first rule whose needle appears wins; unmatched calls exit 0.
#[derive(Default)]
pub struct FakeExecutor {
    rules: Mutex<Vec<(String, VecDeque<Result<CommandOutput, CommandError>>)>>,
    pub log: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, responses: Vec<Result<CommandOutput, CommandError>>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), responses.into()));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let line = format!("{} {}", program, args.join(" "));
        self.log.lock().unwrap().push(line.clone());

        let mut rules = self.rules.lock().unwrap();
        for (needle, responses) in rules.iter_mut() {
            if line.contains(needle.as_str()) {
                // The last scripted response repeats once the queue is down to it
                if responses.len() > 1 {
                    return responses.pop_front().unwrap();
                }
                if let Some(last) = responses.front() {
                    return last.clone();
                }
            }
        }
        Ok(exit(0, ""))
    }
}

pub fn exit(status_code: i32, stdout: &str) -> CommandOutput {
    CommandOutput {
        status_code,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

//! Scripted executor for runner tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::process::{CommandExecutor, CommandSpec, ExecError, ProcessOutput};

/// Canned response for one artifact
#[derive(Clone, Debug, Default)]
pub struct Scripted {
    output: ProcessOutput,
    spawn_error: bool,
    delay: Duration,
}

impl Scripted {
    pub fn exit(code: i32) -> Self {
        Self {
            output: ProcessOutput {
                exit_code: Some(code),
                ..ProcessOutput::default()
            },
            ..Self::default()
        }
    }

    pub fn timeout() -> Self {
        Self {
            output: ProcessOutput {
                exit_code: None,
                timed_out: true,
                ..ProcessOutput::default()
            },
            ..Self::default()
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Self::default()
        }
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.output.stdout = text.to_string();
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.output.stderr = text.to_string();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Records every call and answers from a table keyed by file name.
/// Unknown files exit 0.
#[derive(Default)]
pub struct SpyExecutor {
    responses: HashMap<String, Scripted>,
    calls: Mutex<Vec<CommandSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SpyExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, file: &str, response: Scripted) -> Self {
        self.responses.insert(file.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn was_called_for(&self, file: &str) -> bool {
        self.calls().iter().any(|spec| target_name(spec) == Some(file.to_string()))
    }

    fn response_for(&self, spec: &CommandSpec) -> Scripted {
        target_name(spec)
            .and_then(|name| self.responses.get(&name).cloned())
            .unwrap_or_else(|| Scripted::exit(0))
    }
}

fn target_name(spec: &CommandSpec) -> Option<String> {
    spec.args.iter().find_map(|arg| {
        let path = Path::new(arg);
        let is_script = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("sql") | Some("sh")
        );
        is_script
            .then(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .flatten()
    })
}

#[async_trait]
impl CommandExecutor for SpyExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<ProcessOutput, ExecError> {
        self.calls.lock().unwrap().push(spec.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let response = self.response_for(spec);
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if response.spawn_error {
            return Err(ExecError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        Ok(response.output)
    }
}

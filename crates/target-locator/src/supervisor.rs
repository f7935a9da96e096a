//! Isolation boundary around a running pipeline.
//!
//! A pipeline runs in its own named thread. Whatever ends it (a fatal
//! [`PipelineError`] or a panic) surfaces as a [`ProcessExit`] to whoever
//! joins the handle; nothing crosses the boundary any other way.

use std::any::Any;
use std::convert::Infallible;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};

use crate::pipeline::{Pipeline, PipelineError};
use crate::source::{FrameSource, SourceError};

/// Terminal state of a pipeline unit.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    #[error("pipeline fault: {0}")]
    Fault(#[from] PipelineError),
    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SuperviseError {
    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to open frame source: {0}")]
    Source(#[from] SourceError),
}

#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    thread: JoinHandle<Result<Infallible, PipelineError>>,
}

/// Start `pipeline` in a new thread called `name`.
pub fn spawn<S>(name: &str, mut pipeline: Pipeline<S>) -> std::io::Result<ProcessHandle>
where
    S: FrameSource + Send + 'static,
{
    let thread = thread::Builder::new().name(name.to_string()).spawn(move || {
        let result = pipeline.run();
        if let Err(e) = &result {
            error!(
                "{e} after {} frames, waiting for supervisor restart",
                pipeline.frame_count()
            );
        }
        result
    })?;
    Ok(ProcessHandle {
        name: name.to_string(),
        thread,
    })
}

impl ProcessHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the unit terminates.
    pub fn join(self) -> ProcessExit {
        match self.thread.join() {
            Ok(Err(e)) => ProcessExit::Fault(e),
            Ok(Ok(never)) => match never {},
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!("{} panicked: {msg}", self.name);
                ProcessExit::Panicked(msg)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restarts after the first unit; `0` runs a single unit.
    pub max_restarts: usize,
    pub backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Run units built by `factory` one after another, restarting after every
/// exit until the policy is exhausted. Returns the last exit.
///
/// `factory` receives the attempt number (0 for the first unit) and must
/// build a pipeline around a freshly opened source.
pub fn supervise<S, F>(
    name: &str,
    mut factory: F,
    policy: RestartPolicy,
) -> Result<ProcessExit, SuperviseError>
where
    S: FrameSource + Send + 'static,
    F: FnMut(usize) -> Result<Pipeline<S>, SourceError>,
{
    let mut attempt = 0;
    loop {
        let handle = spawn(name, factory(attempt)?)?;
        let exit = handle.join();
        if attempt >= policy.max_restarts {
            error!("{name} exited ({exit}), restart budget exhausted");
            return Ok(exit);
        }
        attempt += 1;
        info!(
            "{name} exited ({exit}), restart {attempt}/{} in {:?}",
            policy.max_restarts, policy.backoff
        );
        if !policy.backoff.is_zero() {
            thread::sleep(policy.backoff);
        }
    }
}

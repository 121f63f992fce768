#![allow(dead_code)]

use async_trait::async_trait;
use azure_cli_login::{CommandOutput, CommandRunner, Error, Invocation, Result};
use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    subscriber::DefaultGuard,
};
use tracing_subscriber::{
    layer::{Context, Layer, SubscriberExt},
    registry,
};

/// A [`CommandRunner`] that records invocations instead of running them.
///
/// Responses are keyed by [`Invocation::display_name`], e.g. `"az login"`;
/// unknown commands succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    missing: Vec<String>,
    responses: HashMap<String, CommandOutput>,
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without(mut self, program: &str) -> Self {
        self.missing.push(program.to_owned());
        self
    }

    pub fn respond(mut self, command: &str, output: CommandOutput) -> Self {
        self.responses.insert(command.to_owned(), output);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Each recorded invocation rendered as `program arg arg ...`.
    pub fn commands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|invocation| {
                let program = invocation
                    .program
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                std::iter::once(program)
                    .chain(invocation.args.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn which(&self, program: &str) -> Result<PathBuf> {
        if self.missing.iter().any(|missing| missing == program) {
            return Err(Error::NotFound {
                program: program.to_owned(),
            });
        }
        Ok(PathBuf::from("/usr/bin").join(program))
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
        Ok(self
            .responses
            .get(&invocation.display_name())
            .cloned()
            .unwrap_or_else(|| CommandOutput::success("")))
    }
}

/// Collects the level and message of every event.
#[derive(Clone, Default)]
pub struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedEvents {
    /// Messages of events recorded at `level`.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(recorded, _)| *recorded == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Messages of `WARN` events.
    pub fn messages(&self) -> Vec<String> {
        self.at(Level::WARN)
    }

    pub fn count(&self) -> usize {
        self.messages().len()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*event.metadata().level(), visitor.0));
    }
}

/// Routes this thread's events to a fresh [`CapturedEvents`] collector until the
/// guard is dropped.
pub fn capture_events() -> (CapturedEvents, DefaultGuard) {
    let events = CapturedEvents::default();
    let guard = tracing::subscriber::set_default(registry().with(events.clone()));
    (events, guard)
}

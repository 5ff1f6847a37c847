//! Human-facing progress output (`spec.md` §4.L). There is no `log`/`tracing`
//! dependency anywhere in this workspace — every collaborator that wants to
//! narrate what it's doing takes a `&dyn Reporter` and calls one of its three
//! methods, exactly as the teacher's CLI narrates publish progress directly to
//! stdout rather than through a logging facade.

use std::io::Write;
use std::sync::Mutex;

pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default reporter: info/warn to stdout, error to stderr, each on its own
/// line and prefixed so `deploy --report -` output stays greppable.
#[derive(Default)]
pub struct StdoutReporter {
    lock: Mutex<()>,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for StdoutReporter {
    fn info(&self, message: &str) {
        let _guard = self.lock.lock().expect("reporter lock poisoned");
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        let _guard = self.lock.lock().expect("reporter lock poisoned");
        println!("warning: {message}");
    }

    fn error(&self, message: &str) {
        let _guard = self.lock.lock().expect("reporter lock poisoned");
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "error: {message}");
    }
}

/// Discards everything. Used by tests and by library callers that want to
/// drive the engine without console output.
#[derive(Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Collects messages in memory, for assertions in tests that care about what
/// was reported rather than just its side effect.
#[derive(Default)]
pub struct RecordingReporter {
    pub messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(&'static str, String)> {
        self.messages.lock().expect("recording reporter lock poisoned").clone()
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.messages.lock().expect("recording reporter lock poisoned").push(("info", message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.messages.lock().expect("recording reporter lock poisoned").push(("warn", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages.lock().expect("recording reporter lock poisoned").push(("error", message.to_string()));
    }
}

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use domd::config::ExecutionPolicy;
use domd::exec::ExecutionBackend;
use domd::model::{Command, ExecutionResult, ExecutionStatus};

/// A fake backend that:
/// - records the text of every command it was asked to execute
/// - returns a scripted outcome per command text (default: Success, 0).
///
/// Used to prove properties like "ignored commands never reach a
/// backend" without running anything for real.
pub struct FakeBackend {
    executed: Arc<Mutex<Vec<String>>>,
    outcomes: HashMap<String, (ExecutionStatus, i32)>,
}

impl FakeBackend {
    pub fn new(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self { executed, outcomes: HashMap::new() }
    }

    /// Script a specific outcome for a command text.
    pub fn with_outcome(mut self, text: &str, status: ExecutionStatus, code: i32) -> Self {
        self.outcomes.insert(text.to_string(), (status, code));
        self
    }
}

impl ExecutionBackend for FakeBackend {
    fn execute<'a>(
        &'a self,
        command: &'a Command,
        _policy: &'a ExecutionPolicy,
        _cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
        let executed = Arc::clone(&self.executed);
        let (status, code) = self
            .outcomes
            .get(&command.text)
            .copied()
            .unwrap_or((ExecutionStatus::Success, 0));

        Box::pin(async move {
            {
                let mut guard = executed.lock().unwrap();
                guard.push(command.text.clone());
            }
            ExecutionResult::new(command.fingerprint(), status, code)
        })
    }
}

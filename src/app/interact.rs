use std::sync::Mutex;

use tracing::info;

/// Human-interaction collaborator. `acknowledge` blocks the calling
/// operation (not the whole process) until the user dismisses the message;
/// the authorize protocol relies on this as its out-of-band confirmation
/// checkpoint, and generic error reporting funnels through it as well.
pub trait UserPrompt: Send + Sync {
    fn acknowledge(&self, message: &str);
}

/// Headless stand-in: logs the message and returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPrompt;

impl UserPrompt for NullPrompt {
    fn acknowledge(&self, message: &str) {
        info!(message = %message, "user prompt acknowledged (headless)");
    }
}

/// Test double recording every checkpoint.
#[derive(Debug, Default)]
pub struct RecordingPrompt {
    messages: Mutex<Vec<String>>,
}

impl RecordingPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl UserPrompt for RecordingPrompt {
    fn acknowledge(&self, message: &str) {
        if let Ok(mut guard) = self.messages.lock() {
            guard.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_prompt_counts_checkpoints() {
        let prompt = RecordingPrompt::new();
        prompt.acknowledge("first");
        prompt.acknowledge("second");
        assert_eq!(prompt.count(), 2);
        assert_eq!(prompt.messages(), vec!["first", "second"]);
    }
}

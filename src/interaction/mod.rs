//! User interaction handling for the guided loop
//!
//! Prompts and message display live behind one trait so the loop can be
//! driven by a scripted implementation in tests.

pub mod display;
pub mod prompts;

pub use display::{MessageDisplay, MessageDisplayImpl};
pub use prompts::PrompterImpl;

use anyhow::Result;
use async_trait::async_trait;

/// One entry in a selection menu.
#[derive(Debug, Clone)]
pub struct SelectItem {
    pub label: String,
    pub hint: Option<String>,
    pub enabled: bool,
}

impl SelectItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hint: None,
            enabled: true,
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Trait for everything the loop says to or asks of the user.
#[async_trait]
pub trait UserInteraction: Send + Sync {
    /// Pick one enabled item; returns its index.
    async fn select(
        &self,
        message: &str,
        header: Option<&str>,
        items: &[SelectItem],
    ) -> Result<usize>;

    /// Free-text input.
    async fn text(&self, message: &str, default: Option<&str>) -> Result<String>;

    /// Yes/no confirmation.
    async fn confirm(&self, message: &str) -> Result<bool>;

    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn success(&self, message: &str);
}

/// Default implementation over stdin/stdout.
pub struct TerminalInteraction {
    prompter: PrompterImpl,
    display: MessageDisplayImpl,
}

impl Default for TerminalInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalInteraction {
    pub fn new() -> Self {
        Self {
            prompter: PrompterImpl::new(),
            display: MessageDisplayImpl::new(),
        }
    }
}

#[async_trait]
impl UserInteraction for TerminalInteraction {
    async fn select(
        &self,
        message: &str,
        header: Option<&str>,
        items: &[SelectItem],
    ) -> Result<usize> {
        self.prompter.select(message, header, items).await
    }

    async fn text(&self, message: &str, default: Option<&str>) -> Result<String> {
        self.prompter.text(message, default).await
    }

    async fn confirm(&self, message: &str) -> Result<bool> {
        self.prompter.confirm(message).await
    }

    fn info(&self, message: &str) {
        self.display.info(message);
    }

    fn error(&self, message: &str) {
        self.display.error(message);
    }

    fn success(&self, message: &str) {
        self.display.success(message);
    }
}

/// Scripted interaction for tests: queued answers, recorded output.
#[cfg(test)]
pub struct MockInteraction {
    selections: std::sync::Mutex<std::collections::VecDeque<usize>>,
    texts: std::sync::Mutex<std::collections::VecDeque<String>>,
    confirms: std::sync::Mutex<std::collections::VecDeque<bool>>,
    pub messages: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockInteraction {
    pub fn new() -> Self {
        Self {
            selections: Default::default(),
            texts: Default::default(),
            confirms: Default::default(),
            messages: Default::default(),
        }
    }

    pub fn push_selection(&self, index: usize) {
        self.selections.lock().unwrap().push_back(index);
    }

    pub fn push_text(&self, answer: &str) {
        self.texts.lock().unwrap().push_back(answer.to_string());
    }

    pub fn push_confirm(&self, answer: bool) {
        self.confirms.lock().unwrap().push_back(answer);
    }

    pub fn recorded_messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl UserInteraction for MockInteraction {
    async fn select(
        &self,
        _message: &str,
        _header: Option<&str>,
        items: &[SelectItem],
    ) -> Result<usize> {
        let index = self
            .selections
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted selection left"))?;
        anyhow::ensure!(index < items.len(), "scripted selection out of range");
        anyhow::ensure!(items[index].enabled, "scripted selection is disabled");
        Ok(index)
    }

    async fn text(&self, _message: &str, default: Option<&str>) -> Result<String> {
        let answer = self
            .texts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted text answer left"))?;
        if answer.is_empty() {
            if let Some(default) = default {
                return Ok(default.to_string());
            }
        }
        Ok(answer)
    }

    async fn confirm(&self, _message: &str) -> Result<bool> {
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted confirmation left"))
    }

    fn info(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("error: {message}"));
    }

    fn success(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

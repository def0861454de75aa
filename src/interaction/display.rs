//! Message display implementation

/// Trait for user-facing messages outside of prompts.
pub trait MessageDisplay: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn success(&self, message: &str);
}

pub struct MessageDisplayImpl;

impl Default for MessageDisplayImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDisplayImpl {
    pub fn new() -> Self {
        Self
    }
}

impl MessageDisplay for MessageDisplayImpl {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("✗ {message}");
    }

    fn success(&self, message: &str) {
        println!("✓ {message}");
    }
}

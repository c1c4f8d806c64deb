use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level { Info, Warning, Error }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Info => write!(f, "{}", self.text),
            Level::Warning => write!(f, "Warning: {}", self.text),
            Level::Error => write!(f, "Error: {}", self.text),
        }
    }
}

/// Progress and error messages of a run.
///
/// Every message goes to standard output and to the `log` facade, and is
/// kept so callers can inspect what was reported.
#[derive(Clone, Debug, Default)]
pub struct Messages {
    messages: Vec<Message>,
    quiet: bool,
}

impl Messages {
    /// Collect messages without printing them to standard output.
    pub fn quiet() -> Self {
        Self { messages: Vec::new(), quiet: true }
    }

    pub fn info(&mut self, text: impl Into<String>) { self.push(Level::Info, text.into()) }

    pub fn warning(&mut self, text: impl Into<String>) { self.push(Level::Warning, text.into()) }

    pub fn error(&mut self, text: impl Into<String>) { self.push(Level::Error, text.into()) }

    fn push(&mut self, level: Level, text: String) {
        match level {
            Level::Info => log::info!("{text}"),
            Level::Warning => log::warn!("{text}"),
            Level::Error => log::error!("{text}"),
        }
        let message = Message { level, text };
        if !self.quiet {
            println!("{message}");
        }
        self.messages.push(message);
    }

    #[inline] pub fn all(&self) -> &[Message] { &self.messages }

    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.level == Level::Error)
    }
}

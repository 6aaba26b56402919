use std::sync::{Mutex, Once};

use log::{Log, Metadata, Record};

/// Collects formatted log lines so tests can assert on them.
pub struct TestLogger {
    pub messages: Mutex<Vec<String>>,
}

pub static LOGGER: TestLogger = TestLogger {
    messages: Mutex::new(Vec::new()),
};

pub static INIT: Once = Once::new();

impl Log for TestLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = format!("{} {}", record.level(), record.args());
            match self.messages.lock() {
                Ok(mut messages) => messages.push(line),
                Err(poison) => poison.into_inner().push(line),
            }
        }
    }

    fn flush(&self) {}
}

/// Install the capturing logger once and clear anything captured so far.
pub fn capture(level: log::LevelFilter) {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
    });
    log::set_max_level(level);
    LOGGER.messages.lock().unwrap().clear();
}

pub fn contains(needle: &str) -> bool {
    LOGGER
        .messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains(needle))
}

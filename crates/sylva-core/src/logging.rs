// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Structured logging hooks for the parser and lexer.
//!
//! The runtime emits a stream of short `key:value` event messages while it
//! works — shifts, reductions, lexed tokens, recovery decisions. By
//! default nothing is formatted or emitted; installing a [`Logger`] via
//! [`Parser::set_logger`](crate::Parser::set_logger) turns the stream on.
//! [`TraceLogger`] forwards everything to the `tracing` ecosystem.

/// Which subsystem produced a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// The parser driver.
    Parse,
    /// The lexer.
    Lex,
}

/// A sink for parser log events.
pub trait Logger {
    /// Receives one event message.
    fn log(&mut self, kind: LogKind, message: &str);
}

/// A [`Logger`] that forwards events to [`tracing`] at trace level, under
/// the targets `sylva::parse` and `sylva::lex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceLogger;

impl Logger for TraceLogger {
    fn log(&mut self, kind: LogKind, message: &str) {
        match kind {
            LogKind::Parse => tracing::trace!(target: "sylva::parse", "{message}"),
            LogKind::Lex => tracing::trace!(target: "sylva::lex", "{message}"),
        }
    }
}

/// The parser's internal handle on an optional logger. Formatting is
/// skipped entirely while no logger is installed.
#[derive(Default)]
pub(crate) struct LogSink {
    logger: Option<Box<dyn Logger>>,
}

impl LogSink {
    pub(crate) fn set(&mut self, logger: Option<Box<dyn Logger>>) {
        self.logger = logger;
    }

    pub(crate) fn log(&mut self, kind: LogKind, message: impl FnOnce() -> String) {
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.log(kind, &message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Capture(Rc<RefCell<Vec<(LogKind, String)>>>);

    impl Logger for Capture {
        fn log(&mut self, kind: LogKind, message: &str) {
            self.0.borrow_mut().push((kind, message.to_string()));
        }
    }

    #[test]
    fn sink_formats_only_when_enabled() {
        let mut sink = LogSink::default();
        let mut formatted = false;
        sink.log(LogKind::Parse, || {
            formatted = true;
            String::from("event")
        });
        assert!(!formatted);

        let events = Rc::new(RefCell::new(Vec::new()));
        sink.set(Some(Box::new(Capture(Rc::clone(&events)))));
        sink.log(LogKind::Lex, || String::from("lexed_lookahead sym:id"));
        assert_eq!(
            events.borrow().as_slice(),
            &[(LogKind::Lex, String::from("lexed_lookahead sym:id"))]
        );
    }
}

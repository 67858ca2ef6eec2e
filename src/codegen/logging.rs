use std::fmt::Debug;

/// Supplies the code fragments generated bodies use for logging.
///
/// A style never writes by itself; the generators splice the returned
/// expressions into their output. `logger` is the expression naming the
/// logger instance and `message` an already-quoted string expression.
/// An empty `logger_type` means logging is switched off.
pub trait LoggingStyle: Debug {
    fn logger_type(&self) -> String;
    fn init_logger(&self, scope: &str) -> String;
    fn start(&self, logger: &str) -> String;
    fn assert(&self, logger: &str, expression: &str, message: &str) -> String;
    fn trace(&self, logger: &str, message: &str) -> String;
    fn debug(&self, logger: &str, message: &str) -> String;
    fn info(&self, logger: &str, message: &str) -> String;
    fn warning(&self, logger: &str, message: &str) -> String;
    fn error(&self, logger: &str, message: &str) -> String;
    fn fatal(&self, logger: &str, message: &str) -> String;

    fn is_enabled(&self) -> bool {
        !self.logger_type().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoidLogging;

impl LoggingStyle for VoidLogging {
    fn logger_type(&self) -> String {
        String::new()
    }
    fn init_logger(&self, _: &str) -> String {
        String::new()
    }
    fn start(&self, _: &str) -> String {
        String::new()
    }
    fn assert(&self, _: &str, _: &str, _: &str) -> String {
        String::new()
    }
    fn trace(&self, _: &str, _: &str) -> String {
        String::new()
    }
    fn debug(&self, _: &str, _: &str) -> String {
        String::new()
    }
    fn info(&self, _: &str, _: &str) -> String {
        String::new()
    }
    fn warning(&self, _: &str, _: &str) -> String {
        String::new()
    }
    fn error(&self, _: &str, _: &str) -> String {
        String::new()
    }
    fn fatal(&self, _: &str, _: &str) -> String {
        String::new()
    }
}

/// C++ logging through the `PIDL_LOG_*` macro family of the runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroLogging;

impl MacroLogging {
    fn call(level: &str, logger: &str, message: &str) -> String {
        format!("PIDL_LOG_{level}({logger}, {message})")
    }
}

impl LoggingStyle for MacroLogging {
    fn logger_type(&self) -> String {
        "PIDL_LOGGER_T".to_string()
    }
    fn init_logger(&self, scope: &str) -> String {
        format!("PIDL_LOGGER_INIT(\"{scope}\")")
    }
    fn start(&self, logger: &str) -> String {
        format!("PIDL_LOG_START({logger})")
    }
    fn assert(&self, logger: &str, expression: &str, message: &str) -> String {
        format!("PIDL_LOG_ASSERT({logger}, {expression}, {message})")
    }
    fn trace(&self, logger: &str, message: &str) -> String {
        Self::call("TRACE", logger, message)
    }
    fn debug(&self, logger: &str, message: &str) -> String {
        Self::call("DEBUG", logger, message)
    }
    fn info(&self, logger: &str, message: &str) -> String {
        Self::call("INFO", logger, message)
    }
    fn warning(&self, logger: &str, message: &str) -> String {
        Self::call("WARNING", logger, message)
    }
    fn error(&self, logger: &str, message: &str) -> String {
        Self::call("ERROR", logger, message)
    }
    fn fatal(&self, logger: &str, message: &str) -> String {
        Self::call("FATAL", logger, message)
    }
}

/// C# logging through `System.Diagnostics.TraceSource`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceSourceLogging;

impl TraceSourceLogging {
    fn event(kind: &str, logger: &str, message: &str) -> String {
        format!("{logger}.TraceEvent(System.Diagnostics.TraceEventType.{kind}, 0, {message})")
    }
}

impl LoggingStyle for TraceSourceLogging {
    fn logger_type(&self) -> String {
        "System.Diagnostics.TraceSource".to_string()
    }
    fn init_logger(&self, scope: &str) -> String {
        format!("new System.Diagnostics.TraceSource(\"{scope}\")")
    }
    fn start(&self, logger: &str) -> String {
        Self::event("Start", logger, "\"start\"")
    }
    fn assert(&self, _: &str, expression: &str, message: &str) -> String {
        format!("System.Diagnostics.Debug.Assert({expression}, {message})")
    }
    fn trace(&self, logger: &str, message: &str) -> String {
        Self::event("Verbose", logger, message)
    }
    fn debug(&self, logger: &str, message: &str) -> String {
        Self::event("Verbose", logger, message)
    }
    fn info(&self, logger: &str, message: &str) -> String {
        Self::event("Information", logger, message)
    }
    fn warning(&self, logger: &str, message: &str) -> String {
        Self::event("Warning", logger, message)
    }
    fn error(&self, logger: &str, message: &str) -> String {
        Self::event("Error", logger, message)
    }
    fn fatal(&self, logger: &str, message: &str) -> String {
        Self::event("Critical", logger, message)
    }
}

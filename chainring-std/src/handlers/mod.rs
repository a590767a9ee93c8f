//! Ready-made handlers.

mod logging;

pub use logging::LoggingHandler;

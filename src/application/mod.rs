mod application;
mod event_printer;
mod runtime_config;

pub use application::{Application, ApplicationError};
pub use event_printer::EventPrinter;
pub use runtime_config::RuntimeConfig;

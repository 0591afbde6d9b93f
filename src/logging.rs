//! Console logging through `log4rs`.
//!
//! Call [`init_logging`] once at start-up; [`set_log_level`] changes the level afterwards.

use crate::error::CityError;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;
use std::sync::Mutex;

pub const LOG_PATTERN: &str = "{d(%d/%m/%Y %H:%M:%S,%3f)} - {l} - {m}{n}";

const CONSOLE_APPENDER: &str = "console";

static LOG_HANDLE: Mutex<Option<Handle>> = Mutex::new(None);

fn build_config(level: LevelFilter) -> Result<Config, CityError> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    Config::builder()
        .appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)))
        .build(Root::builder().appender(CONSOLE_APPENDER).build(level))
        .map_err(|e| CityError::Logging(e.to_string()))
}

/// Starts logging to the console at `level`. Calling it again just changes the level.
pub fn init_logging(level: LevelFilter) -> Result<(), CityError> {
    let config = build_config(level)?;
    let mut guard = LOG_HANDLE.lock().expect("log handle lock poisoned");
    if let Some(handle) = guard.as_ref() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config).map_err(|e| CityError::Logging(e.to_string()))?;
    *guard = Some(handle);
    Ok(())
}

/// Changes the level of a running logger. Does nothing before [`init_logging`].
pub fn set_log_level(level: LevelFilter) -> Result<(), CityError> {
    let config = build_config(level)?;
    if let Some(handle) = LOG_HANDLE.lock().expect("log handle lock poisoned").as_ref() {
        handle.set_config(config);
    }
    Ok(())
}

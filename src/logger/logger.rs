use ecs_logger::extra_fields;
use log::warn;
use serde::Serialize;
use crate::config::settings::{Logger, SETTINGS};

#[derive(Serialize)]
pub struct LoggerExtraFields {
    pub request_id: String,
}

pub fn parse_level(level: &str) -> log::LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

pub fn setup_logger() {
    let setting_level = SETTINGS
        .logger
        .clone()
        .unwrap_or(Logger { level: "info".to_string() })
        .level;

    env_logger::builder()
        .filter_level(parse_level(&setting_level))
        .format_timestamp_micros()
        .format(ecs_logger::format)
        .target(env_logger::Target::Stdout)
        .init();
}

/// Attaches `request_id` to every log line until dropped.
pub struct RequestLogContext {
    clear: fn(),
}

impl RequestLogContext {
    pub fn attach(request_id: String) -> Self {
        Self::attach_with(request_id, extra_fields::clear_extra_fields)
    }

    fn attach_with(request_id: String, clear: fn()) -> Self {
        if let Err(e) = extra_fields::set_extra_fields(LoggerExtraFields { request_id }) {
            warn!("failed to attach request id to log context: {e}");
        }
        RequestLogContext { clear }
    }
}

impl Drop for RequestLogContext {
    fn drop(&mut self) {
        (self.clear)();
    }
}

use dotenv::dotenv;
use log::debug;

/// Loads `.env` into the process environment when one exists.
pub fn init() {
    if let Err(e) = dotenv() {
        debug!("no .env file loaded: {e}");
    }
}

pub fn get_or(parameter: &str, default: &str) -> String {
    std::env::var(parameter).unwrap_or_else(|_| default.to_string())
}

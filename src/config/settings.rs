use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{env, fmt};
use crate::config::parameter;

pub static SETTINGS: Lazy<Settings> = Lazy::new(|| Settings::new().expect("Failed to setup settings"));

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub http_port: u16,
    pub request_timeout: Option<u64>,
    pub max_body_bytes: Option<usize>,
    pub upload_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detector {
    pub model_path: String,
    pub threshold: Option<f32>,
    pub threshold_file: Option<String>,
    pub label_map_file: Option<String>,
    #[serde(default)]
    pub flip_labels: bool,
    pub input_size: Option<u32>,
    pub layout: Option<String>,
    pub intra_threads: Option<usize>,
    #[serde(default)]
    pub require_model: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tracer {
    pub uri: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Option<String>,
    pub server: Server,
    pub logger: Option<Logger>,
    pub database: Database,
    pub detector: Detector,
    pub tracer: Option<Tracer>,
    pub app: App,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = parameter::get_or("RUN_MODE", "development");

        let mut builder = Config::builder()
            .add_source(File::with_name("conf/config.toml").format(FileFormat::Toml))
            .add_source(File::with_name("conf/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("conf/local").required(false))
            .add_source(Environment::default().separator("__"));

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.http_port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn tracer_uri(&self) -> Option<&str> {
        self.tracer
            .as_ref()
            .and_then(|t| t.uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "http://localhost:{}", &self.http_port)
    }
}

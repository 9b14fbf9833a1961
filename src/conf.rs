use config::{Config, ConfigError, Environment};
use lazy_static::lazy_static;
use serde::Deserialize;

fn default_service_name() -> String {
    "resumeparse".into()
}

fn default_listen_port() -> String {
    "8000".into()
}

fn default_ai_max_retries() -> u32 {
    3
}

fn default_ai_retry_base_ms() -> u64 {
    1000
}

fn default_ai_retry_cap_ms() -> u64 {
    4000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Deserialize, Debug)]
pub struct Settings {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: String,
    #[serde(default)]
    pub ai_endpoint: String,
    #[serde(default)]
    pub ai_provider: String,
    #[serde(default)]
    pub ai_model: String,
    #[serde(default)]
    pub ai_key: String,
    #[serde(default = "default_ai_max_retries")]
    pub ai_max_retries: u32,
    #[serde(default = "default_ai_retry_base_ms")]
    pub ai_retry_base_ms: u64,
    #[serde(default = "default_ai_retry_cap_ms")]
    pub ai_retry_cap_ms: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let conf = Config::builder()
            .add_source(Environment::default())
            .build()?;
        let mut s: Settings = conf.try_deserialize()?;
        match s.ai_provider.as_str(){
        "ollama" => {
            s.ai_key = "ollama".into();
            s.ai_endpoint = "http://localhost:11434/v1".into();
            if s.ai_model.is_empty(){
                s.ai_model = "gemma3:12b".into();
            }
        },
        "openai" => {
            s.ai_endpoint = "https://api.openai.com/v1".into();
            if s.ai_model.is_empty(){
                s.ai_model = "gpt-4o-mini".into();
            }
        },
        "gemini" => {
            s.ai_endpoint = "https://generativelanguage.googleapis.com/v1beta/openai".into();
            if s.ai_model.is_empty(){
                s.ai_model = "gemini-2.5-flash".into();
            }
        },
        _ => {}
    }
        Ok(s)
    }
}

lazy_static! {
    pub static ref settings: Settings = Settings::new().expect("improperly configured");
}

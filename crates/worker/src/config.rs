use std::env;

use brandwatch_common::error::BrandwatchError;
use uuid::Uuid;

/// Selected embedding backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingsProvider {
    Local,
    OpenAi,
    Gemini,
}

/// Selected LLM backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Mock,
    OpenAi,
    Gemini,
}

/// Log verbosity, mapped onto a `tracing` level at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

/// Complete runtime configuration, loaded once from the environment at
/// startup. Mirrors the field set in spec §6 verbatim; every numeric
/// field's valid range is enforced by `from_env`.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub worker_id: String,
    pub chunk_batch_size: u32,

    pub embeddings_provider: EmbeddingsProvider,
    pub llm_provider: LlmProvider,

    pub embedding_api_key: Option<String>,
    pub llm_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    pub gemini_model: String,
    pub gemini_api_version: String,
    pub openai_model: String,

    pub max_retries: u32,
    pub retry_backoff_base: f64,

    pub prometheus_port: u16,
    pub http_port: u16,

    pub log_level: LogLevel,

    pub heartbeat_interval_sec: u64,
    pub blpop_timeout_sec: u64,
    pub metrics_wait_log_interval_sec: u64,

    pub redis_queue_prefix: String,
    pub redis_result_prefix: String,
    pub redis_failed_prefix: String,
    pub redis_spike_prefix: String,
    pub spike_history_ttl_sec: u64,

    pub llm_summary_max_tokens: u32,
    pub llm_timeout_sec: u64,
    pub llm_min_delay_sec: f64,
    pub llm_max_concurrency: usize,

    pub embeddings_batch_size: u32,
    pub preprocessing_examples: usize,
}

macro_rules! require {
    ($errors:expr, $name:literal) => {{
        match env::var($name) {
            Ok(v) if !v.is_empty() => Some(v),
            _ => {
                $errors.push(format!("{} must be set", $name));
                None
            }
        }
    }};
}

fn opt_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_u32(errors: &mut Vec<String>, name: &str, raw: Option<String>, min: u32) -> u32 {
    match raw.and_then(|v| v.parse::<u32>().ok()) {
        Some(v) if v >= min => v,
        _ => {
            errors.push(format!("{name} must be an integer >= {min}"));
            min
        }
    }
}

fn parse_u64(errors: &mut Vec<String>, name: &str, raw: Option<String>, min: u64) -> u64 {
    match raw.and_then(|v| v.parse::<u64>().ok()) {
        Some(v) if v >= min => v,
        _ => {
            errors.push(format!("{name} must be an integer >= {min}"));
            min
        }
    }
}

fn parse_f64(errors: &mut Vec<String>, name: &str, raw: Option<String>, min: f64, default: f64) -> f64 {
    match raw {
        None => default,
        Some(v) => match v.parse::<f64>() {
            Ok(v) if v >= min => v,
            _ => {
                errors.push(format!("{name} must be a number >= {min}"));
                default
            }
        },
    }
}

impl WorkerConfig {
    /// Load configuration from the environment (case-insensitive env var
    /// names, uppercased before lookup). Loads a `.env` file first if
    /// present, same role as `pydantic_settings`'s `env_file`.
    pub fn from_env() -> Result<Self, BrandwatchError> {
        let _ = dotenvy::dotenv();

        let mut errors: Vec<String> = Vec::new();

        let redis_url = require!(errors, "REDIS_URL").unwrap_or_default();
        let worker_id = opt_var("WORKER_ID").unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));

        let chunk_batch_size = parse_u32(&mut errors, "CHUNK_BATCH_SIZE", opt_var("CHUNK_BATCH_SIZE"), 1);

        let embeddings_provider = match opt_var("EMBEDDINGS_PROVIDER").as_deref() {
            Some("local") => EmbeddingsProvider::Local,
            Some("openai") => EmbeddingsProvider::OpenAi,
            Some("gemini") => EmbeddingsProvider::Gemini,
            other => {
                errors.push(format!(
                    "EMBEDDINGS_PROVIDER must be one of local, openai, gemini (got {:?})",
                    other
                ));
                EmbeddingsProvider::Local
            }
        };

        let llm_provider = match opt_var("LLM_PROVIDER").as_deref() {
            Some("mock") => LlmProvider::Mock,
            Some("openai") => LlmProvider::OpenAi,
            Some("gemini") => LlmProvider::Gemini,
            other => {
                errors.push(format!(
                    "LLM_PROVIDER must be one of mock, openai, gemini (got {:?})",
                    other
                ));
                LlmProvider::Mock
            }
        };

        let embedding_api_key = opt_var("EMBEDDING_API_KEY");
        let llm_api_key = opt_var("LLM_API_KEY");
        let gemini_api_key = opt_var("GEMINI_API_KEY");
        let openai_api_key = opt_var("OPENAI_API_KEY");

        if llm_provider == LlmProvider::Gemini && gemini_api_key.is_none() {
            errors.push("GEMINI_API_KEY must be set when LLM_PROVIDER is 'gemini'".into());
        }
        if llm_provider == LlmProvider::OpenAi && openai_api_key.is_none() {
            errors.push("OPENAI_API_KEY must be set when LLM_PROVIDER is 'openai'".into());
        }
        if embeddings_provider != EmbeddingsProvider::Local && embedding_api_key.is_none() {
            errors.push("EMBEDDING_API_KEY must be set when EMBEDDINGS_PROVIDER is not 'local'".into());
        }

        let gemini_model = opt_var("GEMINI_MODEL").unwrap_or_default();
        let gemini_api_version = opt_var("GEMINI_API_VERSION").unwrap_or_else(|| "v1".to_string());
        let openai_model = opt_var("OPENAI_MODEL").unwrap_or_default();

        let max_retries = parse_u32(&mut errors, "MAX_RETRIES", opt_var("MAX_RETRIES"), 0);
        let retry_backoff_base = parse_f64(&mut errors, "RETRY_BACKOFF_BASE", opt_var("RETRY_BACKOFF_BASE"), 0.0, 0.0);

        let prometheus_port = parse_u32(&mut errors, "PROMETHEUS_PORT", opt_var("PROMETHEUS_PORT"), 1) as u16;
        let http_port = parse_u32(&mut errors, "HTTP_PORT", opt_var("HTTP_PORT"), 1) as u16;

        let log_level = match opt_var("LOG_LEVEL").as_deref() {
            Some("debug") => LogLevel::Debug,
            Some("info") => LogLevel::Info,
            Some("warning") => LogLevel::Warning,
            Some("error") => LogLevel::Error,
            Some("critical") => LogLevel::Critical,
            other => {
                errors.push(format!(
                    "LOG_LEVEL must be one of debug, info, warning, error, critical (got {:?})",
                    other
                ));
                LogLevel::Info
            }
        };

        let heartbeat_interval_sec = parse_u64(&mut errors, "HEARTBEAT_INTERVAL_SEC", opt_var("HEARTBEAT_INTERVAL_SEC"), 1);
        let blpop_timeout_sec = parse_u64(&mut errors, "BLPOP_TIMEOUT_SEC", opt_var("BLPOP_TIMEOUT_SEC"), 1);
        let metrics_wait_log_interval_sec = parse_u64(
            &mut errors,
            "METRICS_WAIT_LOG_INTERVAL_SEC",
            opt_var("METRICS_WAIT_LOG_INTERVAL_SEC"),
            1,
        );

        let redis_queue_prefix = require!(errors, "REDIS_QUEUE_PREFIX").unwrap_or_default();
        let redis_result_prefix = require!(errors, "REDIS_RESULT_PREFIX").unwrap_or_default();
        let redis_failed_prefix = require!(errors, "REDIS_FAILED_PREFIX").unwrap_or_default();
        let redis_spike_prefix = require!(errors, "REDIS_SPIKE_PREFIX").unwrap_or_default();
        let spike_history_ttl_sec = parse_u64(&mut errors, "SPIKE_HISTORY_TTL_SEC", opt_var("SPIKE_HISTORY_TTL_SEC"), 60);

        let llm_summary_max_tokens = parse_u32(&mut errors, "LLM_SUMMARY_MAX_TOKENS", opt_var("LLM_SUMMARY_MAX_TOKENS"), 16);
        let llm_timeout_sec = parse_u64(&mut errors, "LLM_TIMEOUT_SEC", opt_var("LLM_TIMEOUT_SEC"), 1);
        let llm_min_delay_sec = parse_f64(&mut errors, "LLM_MIN_DELAY_SEC", opt_var("LLM_MIN_DELAY_SEC"), 0.0, 2.0);
        let llm_max_concurrency = parse_u32(&mut errors, "LLM_MAX_CONCURRENCY", opt_var("LLM_MAX_CONCURRENCY"), 1).max(1);

        let embeddings_batch_size = parse_u32(&mut errors, "EMBEDDINGS_BATCH_SIZE", opt_var("EMBEDDINGS_BATCH_SIZE"), 1);
        let preprocessing_examples = parse_u32(&mut errors, "PREPROCESSING_EXAMPLES", opt_var("PREPROCESSING_EXAMPLES"), 1);

        if !errors.is_empty() {
            return Err(BrandwatchError::Config(errors.join("; ")));
        }

        Ok(Self {
            redis_url,
            worker_id,
            chunk_batch_size,
            embeddings_provider,
            llm_provider,
            embedding_api_key,
            llm_api_key,
            gemini_api_key,
            openai_api_key,
            gemini_model,
            gemini_api_version,
            openai_model,
            max_retries,
            retry_backoff_base,
            prometheus_port,
            http_port,
            log_level,
            heartbeat_interval_sec,
            blpop_timeout_sec,
            metrics_wait_log_interval_sec,
            redis_queue_prefix,
            redis_result_prefix,
            redis_failed_prefix,
            redis_spike_prefix,
            spike_history_ttl_sec,
            llm_summary_max_tokens,
            llm_timeout_sec,
            llm_min_delay_sec,
            llm_max_concurrency: llm_max_concurrency as usize,
            embeddings_batch_size,
            preprocessing_examples: preprocessing_examples as usize,
        })
    }
}

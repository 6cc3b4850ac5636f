//! Configuration module - CLI arguments and server settings

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u32 = 23120;

/// Default idle session lifetime (5 minutes)
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 300_000;

/// Optional configuration parameters for ServerConfig::new()
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub library_path: Option<PathBuf>,
    pub session_timeout_ms: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub max_request_bytes: Option<usize>,
    pub max_body_bytes: Option<usize>,
    pub chunk_size: Option<usize>,
    pub idle_retry_ms: Option<u64>,
    pub max_idle_retries: Option<u32>,
    pub backoff: Option<Backoff>,
    pub keep_alive_timeout_secs: Option<u64>,
    pub max_requests_per_connection: Option<usize>,
    pub http_log_dir: Option<PathBuf>,
}

/// Wait schedule between idle read attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same interval before every retry
    Fixed,
    /// Interval grows with the attempt number (1x, 2x, 3x, ...)
    Linear,
}

impl Backoff {
    /// Delay to wait for readable bytes on the given zero-based idle attempt
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        match self {
            Self::Fixed => base,
            Self::Linear => base.saturating_mul(attempt.saturating_add(1)),
        }
    }
}

/// Limits applied while assembling a request from a connection
#[derive(Debug, Clone)]
pub struct ReadPolicy {
    /// Cap on the header block (request line + headers + terminator)
    pub max_request_bytes: usize,
    /// Cap on a declared Content-Length
    pub max_body_bytes: usize,
    /// Upper bound for a single read
    pub chunk_size: usize,
    pub idle_retry_interval: Duration,
    pub max_idle_retries: u32,
    pub backoff: Backoff,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            max_request_bytes: 4096,
            max_body_bytes: 1024 * 1024,
            chunk_size: 1024,
            idle_retry_interval: Duration::from_millis(10),
            max_idle_retries: 10,
            backoff: Backoff::Fixed,
        }
    }
}

impl ReadPolicy {
    /// Total time spent waiting before the assembler gives up on an idle connection
    pub fn idle_budget(&self) -> Duration {
        (0..self.max_idle_retries)
            .map(|attempt| self.backoff.delay(self.idle_retry_interval, attempt))
            .sum()
    }
}

/// Persistent connection limits, also advertised in the Keep-Alive header
#[derive(Debug, Clone)]
pub struct KeepAlivePolicy {
    pub timeout: Duration,
    pub max_requests: usize,
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_requests: 100,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub library_path: Option<PathBuf>,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub read_policy: ReadPolicy,
    pub keep_alive: KeepAlivePolicy,
    pub http_log_dir: PathBuf,
}

impl ServerConfig {
    /// Create a new ServerConfig with required host and port, plus optional settings
    pub fn new(host: String, port: u32, options: ServerOptions) -> Result<Arc<Self>> {
        let host = host.trim().to_string();
        if host.is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }

        let port = validate_port(port)?;

        let defaults = ReadPolicy::default();
        let read_policy = ReadPolicy {
            max_request_bytes: options
                .max_request_bytes
                .unwrap_or(defaults.max_request_bytes),
            max_body_bytes: options.max_body_bytes.unwrap_or(defaults.max_body_bytes),
            chunk_size: options.chunk_size.unwrap_or(defaults.chunk_size),
            idle_retry_interval: options
                .idle_retry_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_retry_interval),
            max_idle_retries: options.max_idle_retries.unwrap_or(defaults.max_idle_retries),
            backoff: options.backoff.unwrap_or(defaults.backoff),
        };

        if read_policy.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than zero"));
        }
        if read_policy.chunk_size > read_policy.max_request_bytes {
            return Err(anyhow!(
                "chunk_size {} exceeds max_request_bytes {}",
                read_policy.chunk_size,
                read_policy.max_request_bytes
            ));
        }

        let session_timeout_ms = options
            .session_timeout_ms
            .unwrap_or(DEFAULT_SESSION_TIMEOUT_MS);
        if session_timeout_ms == 0 {
            return Err(anyhow!("session timeout must be greater than zero"));
        }

        let keep_alive_defaults = KeepAlivePolicy::default();
        let keep_alive = KeepAlivePolicy {
            timeout: options
                .keep_alive_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(keep_alive_defaults.timeout),
            max_requests: options
                .max_requests_per_connection
                .unwrap_or(keep_alive_defaults.max_requests)
                .max(1),
        };

        Ok(Arc::new(Self {
            host,
            port,
            library_path: options.library_path,
            session_timeout: Duration::from_millis(session_timeout_ms),
            sweep_interval: Duration::from_secs(options.sweep_interval_secs.unwrap_or(60).max(1)),
            read_policy,
            keep_alive,
            http_log_dir: options
                .http_log_dir
                .unwrap_or_else(|| PathBuf::from(".library-mcp")),
        }))
    }

    /// Address string suitable for TcpListener::bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reject ports outside 1-65535
pub fn validate_port(port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(anyhow!("port must be between 1 and 65535, got {}", port)),
    }
}

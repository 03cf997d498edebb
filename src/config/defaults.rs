/// Default configuration constants used across the dashboard.

/// Default dashboard listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host (loopback only).
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default backend API location.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4321";

/// Default per-request backend timeout.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

/// Edit sessions untouched for this long are dropped (30 minutes).
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 30 * 60;

/// Maximum number of concurrently open edit sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 256;

/// Maximum size for a config file (1 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Environment variable overriding the backend URL.
pub const ENV_BACKEND_URL: &str = "OPAMP_API_URL";

/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "OPAMP_DASHBOARD_PORT";

/// Environment variable overriding the bind host.
pub const ENV_BIND: &str = "OPAMP_DASHBOARD_BIND";

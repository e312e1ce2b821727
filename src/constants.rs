// -
// Remote store defaults

/// etcd v3 JSON gateway base url
pub(crate) const DEFAULT_ETCD_URL: &str = "http://127.0.0.1:2379/v3";

/// Request timeout applied to every gateway call
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Gateway endpoints
pub(crate) const ETCD_RANGE_PATH: &str = "/kv/range";
pub(crate) const ETCD_PUT_PATH: &str = "/kv/put";
pub(crate) const ETCD_DELETE_RANGE_PATH: &str = "/kv/deleterange";
pub(crate) const ETCD_AUTHENTICATE_PATH: &str = "/auth/authenticate";

// -
// Watch defaults

/// Prefix under which every managed key lives
pub const DEFAULT_NAMESPACE: &str = "/micro/config";

/// Poll interval of the watch loop
pub(crate) const DEFAULT_WATCH_INTERVAL_SECS: u64 = 5;

// -
// Pool defaults

pub(crate) const DEFAULT_POOL_MAX_IDLE: usize = 5;
pub(crate) const DEFAULT_POOL_MAX_ACTIVE: usize = 5;

// -
// Settings sources

/// Optional settings file, any extension supported by the `config` crate
pub(crate) const SETTINGS_FILE: &str = "config/confsync";

/// Env var naming an extra settings file
pub(crate) const SETTINGS_PATH_ENV: &str = "CONFSYNC_CONFIG";

/// Prefix of env var overrides, e.g. `CONFSYNC__WATCH__INTERVAL_SECS`
pub(crate) const SETTINGS_ENV_PREFIX: &str = "CONFSYNC";

/// Separator of flattened local config keys
pub(crate) const KEY_SEPARATOR: char = '/';

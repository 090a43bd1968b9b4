use anyhow::{Context, Result};
use std::{env, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Persistent document locations
    pub paths: PathConfig,

    /// Remote account service configuration
    pub gateway: GatewayConfig,

    /// Wi-Fi apply and connectivity check configuration
    pub network: NetworkConfig,

    /// Service units toggled when setup finishes
    pub mode: ModeConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub ui_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub data_dir: PathBuf,
    pub state_file: PathBuf,
    pub wifi_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub login_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub interface: String,
    pub wpa_supplicant_conf: PathBuf,
    pub country: String,
    pub settle_interval: Duration,
    pub ignored_interfaces: Vec<String>,
    pub command_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ModeConfig {
    pub normal_service: String,
    pub setup_service: String,
    pub command_timeout: Duration,
}

impl AppConfig {
    /// Load and validate all configuration from environment variables
    ///
    /// Unset variables fall back to their defaults; set but unparsable values are errors.
    pub fn from_env() -> Result<Self> {
        let command_timeout = Duration::from_secs(parse_var("COMMAND_TIMEOUT_SECS", 15)?);

        Ok(Self {
            server: ServerConfig::load()?,
            paths: PathConfig::load(),
            gateway: GatewayConfig::load()?,
            network: NetworkConfig::load(command_timeout)?,
            mode: ModeConfig::load(command_timeout),
        })
    }
}

impl ServerConfig {
    fn load() -> Result<Self> {
        let bind_address = parse_var("UI_BIND_ADDRESS", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_var("UI_PORT", 8080)?;
        let ui_dir = var_or("UI_DIR", "/opt/homebase/app/ui").into();

        Ok(Self {
            bind_address,
            port,
            ui_dir,
        })
    }
}

impl PathConfig {
    fn load() -> Self {
        let data_dir = PathBuf::from(var_or("DATA_DIR", "/opt/homebase/data"));

        Self {
            state_file: data_dir.join("state.json"),
            wifi_file: data_dir.join("wifi.json"),
            data_dir,
        }
    }
}

impl GatewayConfig {
    fn load() -> Result<Self> {
        let login_url = var_or(
            "AEROFRAME_LOGIN_URL",
            "https://aerofra.me/api/auth/login.php",
        );
        let timeout = Duration::from_secs(parse_var("GATEWAY_TIMEOUT_SECS", 10)?);

        Ok(Self { login_url, timeout })
    }
}

impl NetworkConfig {
    fn load(command_timeout: Duration) -> Result<Self> {
        let interface = var_or("WIFI_INTERFACE", "wlan0");
        let wpa_supplicant_conf =
            var_or("WPA_SUPPLICANT_CONF", "/etc/wpa_supplicant/wpa_supplicant.conf").into();
        let country = var_or("WIFI_COUNTRY", "US");
        let settle_interval = Duration::from_secs(parse_var("WIFI_SETTLE_SECS", 6)?);
        let ignored_interfaces = parse_list(&var_or("PROBE_IGNORE_INTERFACES", ""));

        Ok(Self {
            interface,
            wpa_supplicant_conf,
            country,
            settle_interval,
            ignored_interfaces,
            command_timeout,
        })
    }
}

impl ModeConfig {
    fn load(command_timeout: Duration) -> Self {
        Self {
            normal_service: var_or("NORMAL_SERVICE", "homebase-normal.service"),
            setup_service: var_or("SETUP_SERVICE", "homebase-hotspot.service"),
            command_timeout,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => parse_value(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .context(format!("failed to parse {name}: invalid format {value:?}"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

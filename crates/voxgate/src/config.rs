//! Process configuration from the environment
//!
//! Everything operational is an environment variable with a `VOX_` prefix;
//! only the SIP account, the AI key and the unlock code are mandatory.

use std::net::{IpAddr, SocketAddr};

use anyhow::{bail, Context};

use voxgate_realtime_ai::{PriceTable, RealtimeConfig};

const DEFAULT_AI_BASE_URL: &str = "wss://api.openai.com/v1/realtime";
const DEFAULT_MINI_MODEL: &str = "gpt-4o-mini-realtime-preview";
const DEFAULT_PREMIUM_MODEL: &str = "gpt-4o-realtime-preview";

/// Parsed process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SIP registrar host
    pub sip_server: String,
    /// SIP registrar port
    pub sip_port: u16,
    /// SIP account user
    pub sip_user: String,
    /// SIP account password
    pub sip_password: String,
    /// Local SIP signalling port
    pub sip_local_port: u16,
    /// Public address; probed via STUN when unset
    pub public_ip: Option<IpAddr>,
    /// STUN servers to probe, in fallback order
    pub stun_servers: Vec<String>,
    /// RTP port window
    pub media_port_min: u16,
    /// RTP port window
    pub media_port_max: u16,
    /// Realtime AI settings
    pub ai: RealtimeConfig,
    /// The security gate's code
    pub unlock_code: String,
    /// Dashboard listen address
    pub dashboard_addr: SocketAddr,
    /// SQLite database path
    pub database_path: String,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required(name: &str) -> anyhow::Result<String> {
    env(name).with_context(|| format!("missing required environment variable {name}"))
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
    }
}

impl Config {
    /// Read the configuration from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        let media_port_min = parsed("VOX_MEDIA_PORT_MIN", 4000u16)?;
        let media_port_max = parsed("VOX_MEDIA_PORT_MAX", 4100u16)?;
        if media_port_min >= media_port_max {
            bail!("VOX_MEDIA_PORT_MIN must be below VOX_MEDIA_PORT_MAX");
        }

        let public_ip = match env("VOX_PUBLIC_IP") {
            Some(raw) => Some(raw.parse().context("invalid VOX_PUBLIC_IP")?),
            None => None,
        };
        let stun_servers: Vec<String> = env("VOX_STUN_SERVERS")
            .unwrap_or_else(|| "stun.l.google.com:19302".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if public_ip.is_none() && stun_servers.is_empty() {
            bail!("set VOX_PUBLIC_IP or at least one VOX_STUN_SERVERS entry");
        }

        let prices = PriceTable {
            mini_input: parsed("VOX_PRICE_MINI_IN", PriceTable::default().mini_input)?,
            mini_output: parsed("VOX_PRICE_MINI_OUT", PriceTable::default().mini_output)?,
            premium_input: parsed("VOX_PRICE_PREMIUM_IN", PriceTable::default().premium_input)?,
            premium_output: parsed(
                "VOX_PRICE_PREMIUM_OUT",
                PriceTable::default().premium_output,
            )?,
        };

        Ok(Self {
            sip_server: required("VOX_SIP_SERVER")?,
            sip_port: parsed("VOX_SIP_PORT", 5060)?,
            sip_user: required("VOX_SIP_USER")?,
            sip_password: required("VOX_SIP_PASSWORD")?,
            sip_local_port: parsed("VOX_SIP_LOCAL_PORT", 5060)?,
            public_ip,
            stun_servers,
            media_port_min,
            media_port_max,
            ai: RealtimeConfig {
                api_key: required("VOX_AI_API_KEY")?,
                base_url: env("VOX_AI_BASE_URL").unwrap_or_else(|| DEFAULT_AI_BASE_URL.into()),
                voice: env("VOX_AI_VOICE").unwrap_or_else(|| "alloy".into()),
                mini_model: env("VOX_AI_MODEL_MINI").unwrap_or_else(|| DEFAULT_MINI_MODEL.into()),
                premium_model: env("VOX_AI_MODEL_PREMIUM")
                    .unwrap_or_else(|| DEFAULT_PREMIUM_MODEL.into()),
                prices,
            },
            unlock_code: required("VOX_UNLOCK_CODE")?,
            dashboard_addr: parsed("VOX_DASHBOARD_ADDR", "0.0.0.0:8080".parse()?)?,
            database_path: env("VOX_DB_PATH").unwrap_or_else(|| "voxgate.db".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; they run in one test to avoid
    // interleaving.
    #[test]
    fn from_env_reads_required_and_defaults() {
        let required_vars = [
            ("VOX_SIP_SERVER", "sip.example.de"),
            ("VOX_SIP_USER", "4910001"),
            ("VOX_SIP_PASSWORD", "secret"),
            ("VOX_AI_API_KEY", "sk-test"),
            ("VOX_UNLOCK_CODE", "7234"),
        ];
        for (k, v) in required_vars {
            std::env::set_var(k, v);
        }
        std::env::set_var("VOX_PUBLIC_IP", "198.51.100.7");

        let config = Config::from_env().unwrap();
        assert_eq!(config.sip_server, "sip.example.de");
        assert_eq!(config.sip_port, 5060);
        assert_eq!(config.media_port_min, 4000);
        assert_eq!(config.ai.base_url, DEFAULT_AI_BASE_URL);
        assert_eq!(config.unlock_code, "7234");
        assert_eq!(config.database_path, "voxgate.db");

        std::env::remove_var("VOX_SIP_SERVER");
        assert!(Config::from_env().is_err());
        for (k, _) in required_vars {
            std::env::remove_var(k);
        }
        std::env::remove_var("VOX_PUBLIC_IP");
    }
}

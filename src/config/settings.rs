use serde::Deserialize;

use crate::dispatch::model::DisconnectPolicy;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub correlator: CorrelatorSettings,
    pub log: LogSettings,
}

/// Address the WebSocket listener binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Operational limits of the hub.
#[derive(Debug, Deserialize, Clone)]
pub struct HubSettings {
    /// Connections accepted beyond this are closed right after the handshake.
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorrelatorSettings {
    pub disconnect_policy: DisconnectPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
    pub with_target: bool,
    pub ansi: bool,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub correlator: Option<PartialCorrelatorSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHubSettings {
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialCorrelatorSettings {
    pub disconnect_policy: Option<DisconnectPolicy>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
    pub with_target: Option<bool>,
    pub ansi: Option<bool>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
            ansi: true,
        }
    }
}

impl PartialSettings {
    /// Overlay the values present here on top of `base`.
    pub fn merge_into(self, base: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let hub = self.hub.unwrap_or_default();
        let correlator = self.correlator.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(base.server.host),
                port: server.port.unwrap_or(base.server.port),
            },
            hub: HubSettings {
                max_connections: hub.max_connections.unwrap_or(base.hub.max_connections),
            },
            correlator: CorrelatorSettings {
                disconnect_policy: correlator
                    .disconnect_policy
                    .unwrap_or(base.correlator.disconnect_policy),
            },
            log: LogSettings {
                level: log.level.unwrap_or(base.log.level),
                with_target: log.with_target.unwrap_or(base.log.with_target),
                ansi: log.ansi.unwrap_or(base.log.ansi),
            },
        }
    }
}

// Relay configuration
//
// Loads the YAML routing file (servers[] of input/output connection
// descriptions) and lowers it into the typed `RelayConfiguration` the
// rest of the crate consumes. A fallible-constructor DTO pattern: parse
// into a file-shaped struct, then validate and lower into the typed
// record, reading a file instead of the environment.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::log::Logger;
use crate::log_error;

const DEFAULT_RTMP_PORT: u16 = 1935;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Host,
    Client,
}

/// One input or output entry of a server description
#[derive(Debug, Clone)]
pub struct ConnectionDescription {
    pub kind: ConnectionKind,
    /// Normalized `"host:port"` strings, in configuration order
    pub addresses: Vec<String>,
    pub connection_timeout: f32,
    pub reconnect_interval: f32,
    pub reconnect_count: u32,
    pub application_name: String,
    pub stream_name: String,
    pub override_application_name: Option<String>,
    pub override_stream_name: Option<String>,
    pub video: bool,
    pub audio: bool,
    pub data: bool,
}

impl ConnectionDescription {
    /// The matching predicate from the routing unit: does a connection
    /// bound to `address`, with the given application/stream name, belong
    /// to this description?
    pub fn matches(&self, address: &str, application_name: &str, stream_name: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
            && (self.application_name.is_empty() || self.application_name == application_name)
            && (self.stream_name.is_empty() || self.stream_name == stream_name)
    }

    /// Address+application match only, used to decide whether a
    /// `connect` should be accepted before the stream name is known.
    pub fn matches_connect(&self, address: &str, application_name: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
            && (self.application_name.is_empty() || self.application_name == application_name)
    }
}

#[derive(Debug, Clone)]
pub struct ServerDescription {
    pub inputs: Vec<ConnectionDescription>,
    pub outputs: Vec<ConnectionDescription>,
}

#[derive(Debug, Clone)]
pub struct RelayConfiguration {
    pub log_level: u32,
    pub status_page_listen: Option<String>,
    pub ping_interval: f32,
    pub servers: Vec<ServerDescription>,
}

impl RelayConfiguration {
    /// All unique listen addresses across every `host`-type input/output,
    /// in first-seen order. Grounded in `Relay.cpp::init`'s
    /// `listenAddresses` set: two descriptions sharing an address bind it
    /// exactly once.
    pub fn listen_addresses(&self) -> Vec<String> {
        let mut seen = Vec::new();

        for server in &self.servers {
            for desc in server.inputs.iter().chain(server.outputs.iter()) {
                if desc.kind != ConnectionKind::Host {
                    continue;
                }
                for address in &desc.addresses {
                    if !seen.contains(address) {
                        seen.push(address.clone());
                    }
                }
            }
        }

        seen
    }

    /// Finds the first server whose input list accepts a `connect` from
    /// `address` under `application_name`, ignoring stream name (it
    /// isn't known yet at `connect` time).
    pub fn find_server_for_connect(&self, address: &str, application_name: &str) -> Option<usize> {
        self.servers
            .iter()
            .position(|server| server.inputs.iter().any(|d| d.matches_connect(address, application_name)))
    }

    pub fn load_from_file(path: &str, logger: &Logger) -> Result<RelayConfiguration, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        let file: RelayConfigFile = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;

        match file.lower() {
            Ok(config) => Ok(config),
            Err(err) => {
                log_error!(logger, "invalid configuration in '{path}': {err}");
                Err(err)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressField {
    Single(String),
    Multiple(Vec<String>),
}

impl AddressField {
    fn into_list(self) -> Vec<String> {
        match self {
            AddressField::Single(s) => vec![s],
            AddressField::Multiple(items) => items,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ConnectionDescriptionFile {
    #[serde(rename = "type")]
    kind: String,
    address: AddressField,
    #[serde(rename = "connectionTimeout", default)]
    connection_timeout: Option<f32>,
    #[serde(rename = "reconnectInterval", default)]
    reconnect_interval: Option<f32>,
    #[serde(rename = "reconnectCount", default)]
    reconnect_count: Option<u32>,
    #[serde(rename = "applicationName", default)]
    application_name: Option<String>,
    #[serde(rename = "streamName", default)]
    stream_name: Option<String>,
    #[serde(rename = "overrideApplicationName", default)]
    override_application_name: Option<String>,
    #[serde(rename = "overrideStreamName", default)]
    override_stream_name: Option<String>,
    #[serde(default = "default_true")]
    video: bool,
    #[serde(default = "default_true")]
    audio: bool,
    #[serde(default = "default_true")]
    data: bool,
}

impl ConnectionDescriptionFile {
    fn lower(self) -> Result<ConnectionDescription, ConfigError> {
        let kind = match self.kind.as_str() {
            "host" => ConnectionKind::Host,
            "client" => ConnectionKind::Client,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "type".to_string(),
                    reason: format!("must be 'host' or 'client', got '{other}'"),
                })
            }
        };

        let addresses = self
            .address
            .into_list()
            .into_iter()
            .map(|a| normalize_address(&a))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ConnectionDescription {
            kind,
            addresses,
            connection_timeout: self.connection_timeout.unwrap_or(0.0),
            reconnect_interval: self.reconnect_interval.unwrap_or(0.0),
            reconnect_count: self.reconnect_count.unwrap_or(0),
            application_name: self.application_name.unwrap_or_default(),
            stream_name: self.stream_name.unwrap_or_default(),
            override_application_name: self.override_application_name,
            override_stream_name: self.override_stream_name,
            video: self.video,
            audio: self.audio,
            data: self.data,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ServerDescriptionFile {
    #[serde(default)]
    inputs: Vec<ConnectionDescriptionFile>,
    #[serde(default)]
    outputs: Vec<ConnectionDescriptionFile>,
}

#[derive(Debug, Deserialize, Default)]
struct LogSectionFile {
    #[serde(default)]
    level: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct StatusPageSectionFile {
    #[serde(default)]
    listen: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelayConfigFile {
    #[serde(default)]
    log: LogSectionFile,
    #[serde(rename = "statusPage", default)]
    status_page: StatusPageSectionFile,
    #[serde(rename = "pingInterval", default)]
    ping_interval: Option<f32>,
    #[serde(default)]
    servers: Vec<ServerDescriptionFile>,
}

impl RelayConfigFile {
    fn lower(self) -> Result<RelayConfiguration, ConfigError> {
        let mut servers = Vec::with_capacity(self.servers.len());

        for server in self.servers {
            let inputs = server
                .inputs
                .into_iter()
                .map(|d| d.lower())
                .collect::<Result<Vec<_>, _>>()?;
            let outputs = server
                .outputs
                .into_iter()
                .map(|d| d.lower())
                .collect::<Result<Vec<_>, _>>()?;

            servers.push(ServerDescription { inputs, outputs });
        }

        Ok(RelayConfiguration {
            log_level: self.log.level.unwrap_or(2),
            status_page_listen: self.status_page.listen,
            ping_interval: self.ping_interval.unwrap_or(0.0),
            servers,
        })
    }
}

/// Normalizes `"host"` / `"host:port"` into `"host:port"`, defaulting the
/// port to 1935
fn normalize_address(address: &str) -> Result<String, ConfigError> {
    if address.is_empty() {
        return Err(ConfigError::InvalidAddress(address.to_string()));
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?;
            if host.is_empty() {
                return Err(ConfigError::InvalidAddress(address.to_string()));
            }
            Ok(format!("{host}:{port}"))
        }
        None => Ok(format!("{address}:{DEFAULT_RTMP_PORT}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_host_with_default_port() {
        assert_eq!(normalize_address("example.com").unwrap(), "example.com:1935");
    }

    #[test]
    fn normalizes_host_with_explicit_port() {
        assert_eq!(normalize_address("example.com:1936").unwrap(), "example.com:1936");
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(normalize_address("example.com:abc").is_err());
    }

    #[test]
    fn loads_minimal_server_list() {
        let yaml = r#"
pingInterval: 5
servers:
  - inputs:
      - type: host
        address: "0.0.0.0:1935"
        applicationName: live
    outputs:
      - type: client
        address:
          - "origin-a:1935"
          - "origin-b:1935"
        overrideStreamName: relayed
"#;
        let file: RelayConfigFile = serde_yaml::from_str(yaml).unwrap();
        let config = file.lower().unwrap();

        assert_eq!(config.ping_interval, 5.0);
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].inputs[0].kind, ConnectionKind::Host);
        assert_eq!(config.servers[0].inputs[0].application_name, "live");
        assert_eq!(config.servers[0].outputs[0].addresses.len(), 2);
        assert_eq!(
            config.servers[0].outputs[0].override_stream_name.as_deref(),
            Some("relayed")
        );
    }

    #[test]
    fn listen_addresses_are_deduplicated() {
        let yaml = r#"
servers:
  - inputs:
      - type: host
        address: "0.0.0.0:1935"
    outputs: []
  - inputs:
      - type: host
        address: "0.0.0.0:1935"
    outputs: []
"#;
        let file: RelayConfigFile = serde_yaml::from_str(yaml).unwrap();
        let config = file.lower().unwrap();

        assert_eq!(config.listen_addresses(), vec!["0.0.0.0:1935".to_string()]);
    }

    #[test]
    fn finds_server_for_connect_by_address_and_app() {
        let yaml = r#"
servers:
  - inputs:
      - type: host
        address: "0.0.0.0:1935"
        applicationName: live
    outputs: []
"#;
        let file: RelayConfigFile = serde_yaml::from_str(yaml).unwrap();
        let config = file.lower().unwrap();

        assert_eq!(config.find_server_for_connect("0.0.0.0:1935", "live"), Some(0));
        assert_eq!(config.find_server_for_connect("0.0.0.0:1935", "other"), None);
    }

    #[test]
    fn rejects_unknown_connection_type() {
        let yaml = r#"
servers:
  - inputs:
      - type: carrier-pigeon
        address: "0.0.0.0:1935"
    outputs: []
"#;
        let file: RelayConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert!(file.lower().is_err());
    }
}

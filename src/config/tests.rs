use super::settings::{PartialHubSettings, PartialServerSettings, PartialSettings, Settings};
use super::{load_config, load_config_from};
use crate::dispatch::model::DisconnectPolicy;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8765);
    assert_eq!(settings.server.addr(), "127.0.0.1:8765");
    assert_eq!(settings.hub.max_connections, 1000);
    assert_eq!(
        settings.correlator.disconnect_policy,
        DisconnectPolicy::Unlink
    );
    assert_eq!(settings.log.level, "info");
}

#[test]
fn partial_settings_only_override_present_values() {
    let partial = PartialSettings {
        server: Some(PartialServerSettings {
            host: None,
            port: Some(9100),
        }),
        hub: Some(PartialHubSettings {
            max_connections: Some(3),
        }),
        ..Default::default()
    };

    let merged = partial.merge_into(Settings::default());
    assert_eq!(merged.server.host, "127.0.0.1");
    assert_eq!(merged.server.port, 9100);
    assert_eq!(merged.hub.max_connections, 3);
    assert_eq!(merged.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("dispatch.toml");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [hub]
        max_connections = 10

        [correlator]
        disconnect_policy = "remove"

        [log]
        level = "debug"
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str()).expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.hub.max_connections, 10);
    assert_eq!(cfg.correlator.disconnect_policy, DisconnectPolicy::Remove);
    assert_eq!(cfg.log.level, "debug");
    assert!(cfg.log.ansi);
}

#[test]
#[serial]
fn missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent.toml");
    assert!(load_config_from(path.to_str()).is_err());
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    temp_env::with_vars(
        [
            ("DISPATCH_SERVER__PORT", Some("9911")),
            ("DISPATCH_HUB__MAX_CONNECTIONS", Some("42")),
            ("DISPATCH_CORRELATOR__DISCONNECT_POLICY", Some("remove")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9911);
            assert_eq!(cfg.hub.max_connections, 42);
            assert_eq!(cfg.correlator.disconnect_policy, DisconnectPolicy::Remove);
            assert_eq!(cfg.server.host, "127.0.0.1");
        },
    );
}

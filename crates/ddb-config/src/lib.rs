#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! YAML configuration schema and loader for the `ddb` aggregator.
//!
//! The spec treats the config *loader* as an external collaborator; this
//! crate exists because the orchestrator still needs the parsed [`Config`]
//! type to construct sessions, and the ambient-stack rule means config
//! loading is never hand-rolled against the stdlib when the corpus reaches
//! for `serde_yaml`.

mod error;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use schema::{
    BrokerConfig, Conf, ComponentConfig, ComponentCred, ComponentStartMode, Config, Framework,
    GdbCommand, SessionMode, SshDefaults,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_nu_config() {
        let yaml = r#"
Framework: Nu
Components:
  - tag: "10.0.0.1:-1234"
    bin: "/usr/bin/app"
    args: ["--flag"]
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.framework, Framework::Nu);
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.components[0].bin.as_deref(), Some("/usr/bin/app"));
        assert_eq!(config.components[0].start_mode, ComponentStartMode::Binary);
    }

    #[test]
    fn defaults_to_unspecified_framework_and_nu_parse_path() {
        let yaml = "Components: []\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.framework, Framework::Unspecified);
        assert!(config.components.is_empty());
    }

    #[test]
    fn parses_service_discovery_and_ssh_and_conf() {
        let yaml = r#"
ServiceDiscovery:
  Broker:
    hostname: "broker.local"
SSH:
  user: "debug"
  port: 2222
Conf:
  sudo: true
  on_exit: kill
Components: []
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let broker = config.service_discovery.unwrap();
        assert_eq!(broker.hostname, "broker.local");
        assert_eq!(config.ssh.user.as_deref(), Some("debug"));
        assert_eq!(config.ssh.port, 2222);
        assert!(config.conf.sudo);
        assert_eq!(config.conf.on_exit, ddb_prelude::OnExit::Kill);
    }

    #[test]
    fn rejects_unknown_on_exit_value() {
        let yaml = "Conf:\n  on_exit: explode\nComponents: []\n";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn attach_components_infer_start_mode_from_pid() {
        let yaml = r#"
Components:
  - tag: "attach-me"
    pid: 4242
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.components[0].start_mode, ComponentStartMode::Attach);
        assert_eq!(config.components[0].pid, 4242);
    }

    #[test]
    fn loads_from_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ddb.yaml");
        std::fs::write(&path, "Components: []\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.components.is_empty());
    }
}

//! Builds a [`SessionSpec`] and the [`Transport`] it will run over, for
//! both statically configured components and dynamically discovered
//! endpoints.
//!
//! Grounded in `original_source/ddb/python/iddb/config.py`'s
//! `parse_nu_config` (static `Components[]`) and
//! `gdb_manager.py`'s `GdbManager.__discover_new_session_async` (dynamic
//! attach on discovery).

use std::env;

use ddb_config::{ComponentConfig, ComponentStartMode, Config, SessionMode};
use ddb_discovery::ServiceInfo;
use ddb_session::SessionSpec;
use ddb_transport::{LocalTransport, SshCredentials, SshTransport, Transport};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Path to the GDB Python extension sourced during remote attach, matching
/// the original's packaged `gdb_ext/runtime-gdb-grpc.py` resource.
const EXTENSION_SCRIPT: &str = "gdb_ext/runtime-gdb-grpc.py";

/// Environment variable carrying the SSH password for dynamically
/// discovered remote sessions. The YAML schema only ever carries a
/// hostname/username pair (`ddb-config::SshDefaults`) — never a secret —
/// so the password has to come from somewhere else; the original's own
/// config loader hardcodes one inline for its one Kubernetes example, which
/// isn't a pattern worth reproducing. An environment variable is the
/// smallest thing that keeps a password out of the config file.
const SSH_PASSWORD_ENV: &str = "DDB_SSH_PASSWORD";

fn ssh_password() -> String {
    env::var(SSH_PASSWORD_ENV).unwrap_or_default()
}

fn current_user() -> String {
    env::var("USER").unwrap_or_else(|_| "root".to_owned())
}

/// Builds the spec/transport pair for one `Components[]` entry, matching
/// `parse_nu_config`'s per-component field resolution.
pub fn static_session(component: &ComponentConfig, config: &Config) -> OrchestratorResult<(SessionSpec, Box<dyn Transport>)> {
    let tag = component
        .tag
        .clone()
        .unwrap_or_else(|| format!("pid-{}", component.pid));
    let cwd = component.cwd.clone().unwrap_or_else(|| ".".to_owned());

    let bin = match component.start_mode {
        ComponentStartMode::Binary => component
            .bin
            .clone()
            .ok_or_else(|| OrchestratorError::MissingBinary(tag.clone()))?,
        ComponentStartMode::Attach => component.bin.clone().unwrap_or_default(),
    };

    let mut spec = SessionSpec::new(tag.clone(), cwd, &bin, component.mode, component.start_mode);
    spec.args = component.args.clone();
    spec.run_delay = component.run_delay;
    spec.sudo = component.sudo.unwrap_or(config.conf.sudo);
    spec.on_exit = config.conf.on_exit;
    spec.attach_pid = component.pid;
    spec.extension_path = EXTENSION_SCRIPT.to_owned();
    spec.prerun_cmds = config.prerun_cmds.iter().map(|c| c.command.clone()).collect();
    spec.postrun_cmds = config.postrun_cmds.iter().map(|c| c.command.clone()).collect();

    let transport: Box<dyn Transport> = match component.mode {
        SessionMode::Local => Box::new(LocalTransport::new()),
        SessionMode::Remote => {
            let cred = component
                .cred
                .as_ref()
                .ok_or_else(|| OrchestratorError::MissingCredentials(tag.clone()))?;
            let credentials = SshCredentials {
                hostname: cred.hostname.clone(),
                port: component.remote_port.unwrap_or(config.ssh.port),
                username: cred.user.clone().or_else(|| config.ssh.user.clone()).unwrap_or_else(current_user),
                password: ssh_password(),
            };
            Box::new(SshTransport::new(credentials))
        }
    };

    Ok((spec, transport))
}

/// Builds the spec/transport pair for one newly discovered endpoint,
/// matching `__discover_new_session_async`: always a remote SSH attach,
/// `mi-async on` prepended ahead of the configured prerun commands.
#[must_use]
pub fn discovered_session(info: &ServiceInfo, config: &Config) -> (SessionSpec, Box<dyn Transport>) {
    let tag = info.session_tag();
    let mut spec = SessionSpec::new(tag, ".", "", SessionMode::Remote, ComponentStartMode::Attach);
    spec.attach_pid = u64::from(info.pid);
    spec.sudo = config.conf.sudo;
    spec.on_exit = config.conf.on_exit;
    spec.extension_path = EXTENSION_SCRIPT.to_owned();

    let mut prerun = vec!["set mi-async on".to_owned()];
    prerun.extend(config.prerun_cmds.iter().map(|c| c.command.clone()));
    spec.prerun_cmds = prerun;
    spec.postrun_cmds = config.postrun_cmds.iter().map(|c| c.command.clone()).collect();

    let credentials = SshCredentials {
        hostname: info.ip.to_string(),
        port: config.ssh.port,
        username: config.ssh.user.clone().unwrap_or_else(current_user),
        password: ssh_password(),
    };
    (spec, Box::new(SshTransport::new(credentials)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_config::Framework;
    use std::net::Ipv4Addr;

    fn base_config() -> Config {
        Config {
            framework: Framework::Nu,
            service_discovery: None,
            ssh: ddb_config::SshDefaults::default(),
            prerun_cmds: Vec::new(),
            postrun_cmds: Vec::new(),
            conf: ddb_config::Conf::default(),
            components: Vec::new(),
        }
    }

    fn component(mode: SessionMode) -> ComponentConfig {
        ComponentConfig {
            tag: Some("worker-a".to_owned()),
            start_mode: ComponentStartMode::Binary,
            pid: 0,
            bin: Some("/srv/app".to_owned()),
            cwd: Some("/srv".to_owned()),
            args: vec!["--flag".to_owned()],
            run_delay: 0.0,
            sudo: None,
            mode,
            remote_port: None,
            cred: Some(ddb_config::ComponentCred {
                hostname: "10.0.0.2".to_owned(),
                user: Some("debug".to_owned()),
            }),
        }
    }

    #[test]
    fn local_component_gets_a_local_transport() {
        let (spec, _transport) = static_session(&component(SessionMode::Local), &base_config()).unwrap();
        assert_eq!(spec.tag, "worker-a");
        assert_eq!(spec.bin, "/srv/app");
    }

    #[test]
    fn binary_component_without_a_bin_path_errors() {
        let mut c = component(SessionMode::Local);
        c.bin = None;
        let err = static_session(&c, &base_config()).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingBinary(_)));
    }

    #[test]
    fn remote_component_without_credentials_errors() {
        let mut c = component(SessionMode::Remote);
        c.cred = None;
        let err = static_session(&c, &base_config()).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingCredentials(_)));
    }

    #[test]
    fn discovered_session_prepends_mi_async_on() {
        let info = ServiceInfo {
            ip: Ipv4Addr::new(10, 0, 0, 5),
            tag: "ignored".to_owned(),
            pid: 4242,
        };
        let (spec, _transport) = discovered_session(&info, &base_config());
        assert_eq!(spec.tag, "10.0.0.5:-4242");
        assert_eq!(spec.prerun_cmds[0], "set mi-async on");
        assert_eq!(spec.attach_pid, 4242);
    }
}

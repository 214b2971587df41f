//! The YAML configuration schema, matching `original_source/ddb/python/iddb/config.py`'s
//! `parse_common_config`/`parse_nu_config` key set (spec §6).

use std::path::Path;

use ddb_prelude::OnExit;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Which component-discovery adapter a config targets. Only `Nu` (and the
/// unspecified default, which follows the same parse path) is implemented
/// in full by this crate; `ServiceWeaverKube` and `VanillaPid` are
/// recognized so `Components` still parses, but their original
/// Kubernetes-pod-listing / raw-pid-attach discovery logic is out of
/// scope per spec §1 ("Kubernetes controllers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framework {
    /// The Nu framework adapter — the default, fully-supported path.
    #[default]
    Nu,
    /// ServiceWeaver-on-Kubernetes adapter (component list only).
    ServiceWeaverKube,
    /// A flat list of PIDs with no framework-specific discovery.
    VanillaPid,
    /// No `Framework` key present; behaves like `Nu`.
    Unspecified,
}

impl Framework {
    fn parse(raw: &str) -> Self {
        match raw {
            "serviceweaver_kube" => Self::ServiceWeaverKube,
            "Nu" => Self::Nu,
            "vanillapid" => Self::VanillaPid,
            _ => Self::Unspecified,
        }
    }
}

/// One named GDB/MI console command, run before or after attach.
#[derive(Debug, Clone, Deserialize)]
pub struct GdbCommand {
    /// A human-readable label for logs; defaults to `"unnamed cmd"` when
    /// absent, matching the original's default.
    #[serde(default = "default_cmd_name")]
    pub name: String,
    /// The console command text (sent via `-interpreter-exec console`).
    pub command: String,
}

fn default_cmd_name() -> String {
    "unnamed cmd".to_owned()
}

/// `ServiceDiscovery.Broker` — enables the MQTT discovery listener
/// (external to this crate; only the connection info lives here).
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname.
    pub hostname: String,
    /// Broker port. Defaults to the well-known discovery port if absent.
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_port() -> u16 {
    1883
}

/// `SSH.{user,port}` — default credentials used for SSH-attached sessions
/// discovered dynamically.
#[derive(Debug, Clone, Deserialize)]
pub struct SshDefaults {
    /// Default SSH username; falls back to the current user if omitted.
    #[serde(default)]
    pub user: Option<String>,
    /// Default SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for SshDefaults {
    fn default() -> Self {
        Self {
            user: None,
            port: default_ssh_port(),
        }
    }
}

/// `Conf.{sudo,on_exit}` — session-wide defaults.
#[derive(Debug, Clone)]
pub struct Conf {
    /// Default `sudo` flag for attaching, used unless a component
    /// overrides it.
    pub sudo: bool,
    /// What a session does with its target process on shutdown.
    pub on_exit: OnExit,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            sudo: false,
            on_exit: OnExit::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConf {
    #[serde(default)]
    sudo: bool,
    #[serde(default)]
    on_exit: Option<String>,
}

impl RawConf {
    fn resolve(self) -> ConfigResult<Conf> {
        let on_exit = match self.on_exit.as_deref() {
            None => OnExit::default(),
            Some("kill") => OnExit::Kill,
            Some("detach") => OnExit::Detach,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "Conf.on_exit".to_owned(),
                    value: other.to_owned(),
                });
            }
        };
        Ok(Conf {
            sudo: self.sudo,
            on_exit,
        })
    }
}

/// How a session reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// GDB runs as a local child process.
    #[default]
    Local,
    /// GDB runs over an SSH-tunneled shell.
    Remote,
}

/// `Components[].startMode` — whether GDB launches the binary itself or
/// attaches to a running PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentStartMode {
    /// GDB loads and launches the binary (`-file-exec-and-symbols` +
    /// `-exec-arguments`).
    #[default]
    Binary,
    /// GDB attaches to an already-running process (`-target-attach`).
    Attach,
}

/// SSH credentials for one remote component, from `Components[].cred`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentCred {
    /// Remote hostname or IP.
    pub hostname: String,
    /// Remote SSH username; falls back to [`SshDefaults::user`] if absent.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    tag: Option<String>,
    #[serde(default)]
    start_mode: Option<String>,
    #[serde(default)]
    pid: u64,
    bin: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    run_delay: f64,
    #[serde(default)]
    sudo: Option<bool>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    remote_port: Option<u16>,
    #[serde(default)]
    cred: Option<ComponentCred>,
}

/// One entry of `Components[]`: a single debugger session to start.
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    /// Human-readable tag, often `"<ip>:-<pid>"`.
    pub tag: Option<String>,
    /// Whether to launch the binary or attach to `pid`.
    pub start_mode: ComponentStartMode,
    /// Process id to attach to (when `start_mode == Attach`).
    pub pid: u64,
    /// Path to the binary (when `start_mode == Binary`).
    pub bin: Option<String>,
    /// Working directory the binary path is resolved relative to.
    pub cwd: Option<String>,
    /// Arguments passed to the binary.
    pub args: Vec<String>,
    /// Seconds to delay before issuing `-exec-run`/`r`/`run`.
    pub run_delay: f64,
    /// Whether to attach/launch GDB under `sudo`; falls back to
    /// [`Conf::sudo`] when unset.
    pub sudo: Option<bool>,
    /// Local or remote (SSH) session.
    pub mode: SessionMode,
    /// Remote gdbserver port, for remote binary-mode sessions.
    pub remote_port: Option<u16>,
    /// SSH credentials, for remote sessions.
    pub cred: Option<ComponentCred>,
}

impl RawComponent {
    fn resolve(self) -> ComponentConfig {
        let start_mode = match self.start_mode.as_deref() {
            Some("attach") | Some("Attach") => ComponentStartMode::Attach,
            _ if self.pid != 0 && self.bin.is_none() => ComponentStartMode::Attach,
            _ => ComponentStartMode::Binary,
        };
        let mode = match self.mode.as_deref() {
            Some("remote") => SessionMode::Remote,
            _ => SessionMode::Local,
        };
        ComponentConfig {
            tag: self.tag,
            start_mode,
            pid: self.pid,
            bin: self.bin,
            cwd: self.cwd,
            args: self.args,
            run_delay: self.run_delay,
            sudo: self.sudo,
            mode,
            remote_port: self.remote_port,
            cred: self.cred,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawServiceDiscovery {
    #[serde(rename = "Broker")]
    broker: BrokerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(rename = "Framework")]
    framework: Option<String>,
    #[serde(rename = "ServiceDiscovery")]
    service_discovery: Option<RawServiceDiscovery>,
    #[serde(rename = "SSH")]
    ssh: Option<SshDefaults>,
    #[serde(rename = "PrerunGdbCommands", default)]
    prerun_gdb_commands: Vec<GdbCommand>,
    #[serde(rename = "PostrunGdbCommands", default)]
    postrun_gdb_commands: Vec<GdbCommand>,
    #[serde(rename = "Conf", default)]
    conf: Option<RawConf>,
    #[serde(rename = "Components", default)]
    components: Vec<RawComponent>,
}

/// The fully resolved configuration driving [`ddb_orchestrator`]'s startup.
///
/// [`ddb_orchestrator`]: https://docs.rs/ddb-orchestrator
#[derive(Debug, Clone)]
pub struct Config {
    /// Which component-discovery adapter this config targets.
    pub framework: Framework,
    /// Service-discovery broker connection info, if enabled.
    pub service_discovery: Option<BrokerConfig>,
    /// Default SSH credentials for dynamically discovered sessions.
    pub ssh: SshDefaults,
    /// Commands run (via `-interpreter-exec console`) before attach/launch.
    pub prerun_cmds: Vec<GdbCommand>,
    /// Commands run after attach/launch.
    pub postrun_cmds: Vec<GdbCommand>,
    /// Session-wide defaults.
    pub conf: Conf,
    /// Statically configured sessions to start at startup.
    pub components: Vec<ComponentConfig>,
}

impl Config {
    /// Parses a `Config` from YAML text already read into memory.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        let framework = raw
            .framework
            .as_deref()
            .map(Framework::parse)
            .unwrap_or_default();
        let conf = match raw.conf {
            Some(r) => r.resolve()?,
            None => Conf::default(),
        };
        Ok(Self {
            framework,
            service_discovery: raw.service_discovery.map(|sd| sd.broker),
            ssh: raw.ssh.unwrap_or_default(),
            prerun_cmds: raw.prerun_gdb_commands,
            postrun_cmds: raw.postrun_gdb_commands,
            conf,
            components: raw.components.into_iter().map(RawComponent::resolve).collect(),
        })
    }

    /// Loads and parses a `Config` from a file path, matching the CLI's
    /// `<config.yaml>` positional argument (spec §6).
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

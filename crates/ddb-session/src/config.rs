//! Per-session construction parameters, grounded in `gdb_session.py`'s
//! `GdbSession.__init__` (the `GdbSessionConfig` it's built from).

use std::path::Path;

use ddb_config::{ComponentStartMode, SessionMode};
use ddb_prelude::OnExit;

/// Everything a [`crate::Session`] needs to know before it can start:
/// resolved once by the orchestrator from `ddb-config`'s `ComponentConfig`
/// plus the aggregator-wide `Conf`/`SSH` defaults, and never mutated after.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Discovery tag, typically `"<ip>:-<pid>"`.
    pub tag: String,
    /// Arguments passed to the binary (`Binary` start mode only).
    pub args: Vec<String>,
    /// Working directory the binary path is resolved against.
    pub cwd: String,
    /// The binary path as given in config, joined onto `cwd` by
    /// [`Self::new`] exactly as `os.path.join(self.cwd, config.binary)`
    /// does in the original.
    pub bin: String,
    /// Local subprocess vs. SSH-attached remote session.
    pub mode: SessionMode,
    /// Whether GDB launches the binary itself or attaches to a pid.
    pub start_mode: ComponentStartMode,
    /// The pid to attach to (`Attach` start mode only).
    pub attach_pid: u64,
    /// Console commands run before attach/launch.
    pub prerun_cmds: Vec<String>,
    /// Commands run after attach/launch, fire-and-forget.
    pub postrun_cmds: Vec<String>,
    /// Verbatim MI commands run between the prerun block and the
    /// attach/launch command (`Attach` start mode only).
    pub initialize_commands: Vec<String>,
    /// Whether to run `gdb` itself under `sudo`.
    pub sudo: bool,
    /// Seconds to delay before issuing a `run`/`-exec-run` command.
    pub run_delay: f64,
    /// What to do with the target process on shutdown.
    pub on_exit: OnExit,
    /// The `mi` interpreter version to request, e.g. `"mi3"`.
    pub mi_version: String,
    /// Path to the GDB Python extension sourced during remote attach
    /// (`gdb_ext/runtime-gdb-grpc.py` in the original package).
    pub extension_path: String,
}

impl SessionSpec {
    /// Builds a spec, joining `cwd` and `binary` the way the original
    /// constructor does.
    #[must_use]
    pub fn new(
        tag: impl Into<String>,
        cwd: impl Into<String>,
        binary: &str,
        mode: SessionMode,
        start_mode: ComponentStartMode,
    ) -> Self {
        let cwd = cwd.into();
        let bin = Path::new(&cwd).join(binary).to_string_lossy().into_owned();
        Self {
            tag: tag.into(),
            args: Vec::new(),
            cwd,
            bin,
            mode,
            start_mode,
            attach_pid: 0,
            prerun_cmds: Vec::new(),
            postrun_cmds: Vec::new(),
            initialize_commands: Vec::new(),
            sudo: false,
            run_delay: 0.0,
            on_exit: OnExit::default(),
            mi_version: "mi3".to_owned(),
            extension_path: String::new(),
        }
    }
}

//! Pure command-sequence builders, grounded in `gdb_session.py`'s
//! `local_start_async`/`remote_attach_async`/`remote_start_async`. Kept
//! free of any transport/state-manager dependency so the exact sequences
//! are unit-testable without a live session.

use ddb_config::ComponentStartMode;

use crate::config::SessionSpec;

/// The argv used to launch GDB itself (`["sudo"]? + "gdb" + "--interpreter=miN" + "-q"`),
/// matching `__prepare_gdb_start_cmd`.
#[must_use]
pub fn gdb_start_argv(spec: &SessionSpec) -> Vec<String> {
    let mut argv = Vec::new();
    if spec.sudo {
        argv.push("sudo".to_owned());
    }
    argv.push("gdb".to_owned());
    argv.push(format!("--interpreter={}", spec.mi_version));
    argv.push("-q".to_owned());
    argv
}

/// The full command line handed to [`ddb_transport::Transport::start`].
/// Local binary sessions append `--args <bin> <args...>` so GDB launches
/// the inferior itself; remote sessions (either start mode) start a bare
/// GDB that is then driven entirely by MI commands, matching
/// `remote_attach`/`remote_start`'s `gdb_controller.start(gdb_cmd)` with no
/// `--args`.
#[must_use]
pub fn command_line(spec: &SessionSpec, local: bool) -> String {
    let mut argv = gdb_start_argv(spec);
    if local && spec.start_mode == ComponentStartMode::Binary {
        argv.push("--args".to_owned());
        argv.push(spec.bin.clone());
        argv.extend(spec.args.iter().cloned());
    }
    argv.join(" ")
}

/// `local_start_async`: prerun commands wrapped as console commands, then
/// `mi-async on` and `non-stop off`, then postrun commands verbatim.
#[must_use]
pub fn local_binary_configure_commands(spec: &SessionSpec) -> Vec<String> {
    let mut cmds = Vec::new();
    for prerun in &spec.prerun_cmds {
        cmds.push(console_exec(prerun));
    }
    cmds.push("-gdb-set mi-async on".to_owned());
    cmds.push("-gdb-set non-stop off".to_owned());
    cmds.extend(spec.postrun_cmds.iter().cloned());
    cmds
}

/// `remote_attach_async`: logging + mi-async, source the extension script,
/// prerun commands (console-wrapped), initialize commands (verbatim),
/// `-target-attach <pid>`, then `signal SIG40` only when discovery is
/// active, then postrun commands verbatim.
#[must_use]
pub fn remote_attach_configure_commands(spec: &SessionSpec, discovery_active: bool) -> Vec<String> {
    let mut cmds = vec![
        "-gdb-set logging enabled on".to_owned(),
        "-gdb-set mi-async on".to_owned(),
        console_exec(&format!("source {}", spec.extension_path)),
    ];
    for prerun in &spec.prerun_cmds {
        cmds.push(console_exec(prerun));
    }
    cmds.extend(spec.initialize_commands.iter().cloned());
    cmds.push(format!("-target-attach {}", spec.attach_pid));
    if discovery_active {
        cmds.push(console_exec("signal SIG40"));
    }
    cmds.extend(spec.postrun_cmds.iter().cloned());
    cmds
}

/// `remote_start_async`: `mi-async on`, prerun commands verbatim (not
/// console-wrapped, unlike the attach path), `-file-exec-and-symbols` +
/// `-exec-arguments`, then postrun commands verbatim.
#[must_use]
pub fn remote_binary_configure_commands(spec: &SessionSpec) -> Vec<String> {
    let mut cmds = vec!["-gdb-set mi-async on".to_owned()];
    cmds.extend(spec.prerun_cmds.iter().cloned());
    cmds.push(format!("-file-exec-and-symbols {}", spec.bin));
    cmds.push(format!("-exec-arguments {}", spec.args.join(" ")));
    cmds.extend(spec.postrun_cmds.iter().cloned());
    cmds
}

fn console_exec(command: &str) -> String {
    format!("-interpreter-exec console \"{command}\"")
}

/// Builds the configure-phase command sequence for `spec`, dispatching on
/// its mode/start-mode combination exactly as `GdbSession.start`/`__start_async`
/// dispatch on `(self.mode, self.startMode)`. `Local`+`Attach` has no
/// counterpart in the original (it only ever binary-launches locally); we
/// fall back to the local binary sequence since both paths issue the same
/// `mi-async`/`non-stop` setup and differ only in what session mode's
/// transport already established before this runs.
#[must_use]
pub fn configure_commands(
    spec: &SessionSpec,
    mode: ddb_config::SessionMode,
    discovery_active: bool,
) -> Vec<String> {
    use ddb_config::SessionMode;
    match (mode, spec.start_mode) {
        (SessionMode::Local, _) => local_binary_configure_commands(spec),
        (SessionMode::Remote, ComponentStartMode::Attach) => {
            remote_attach_configure_commands(spec, discovery_active)
        }
        (SessionMode::Remote, ComponentStartMode::Binary) => {
            remote_binary_configure_commands(spec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_config::SessionMode;

    fn spec() -> SessionSpec {
        let mut s = SessionSpec::new("tag", "/srv", "app", SessionMode::Local, ComponentStartMode::Binary);
        s.args = vec!["--flag".to_owned()];
        s.prerun_cmds = vec!["break main".to_owned()];
        s.postrun_cmds = vec!["continue".to_owned()];
        s
    }

    #[test]
    fn local_command_line_appends_args_for_binary_start() {
        let line = command_line(&spec(), true);
        assert_eq!(line, "gdb --interpreter=mi3 -q --args /srv/app --flag");
    }

    #[test]
    fn remote_command_line_has_no_args() {
        let line = command_line(&spec(), false);
        assert_eq!(line, "gdb --interpreter=mi3 -q");
    }

    #[test]
    fn local_binary_sequence_wraps_prerun_in_console_exec() {
        let cmds = local_binary_configure_commands(&spec());
        assert_eq!(cmds[0], "-interpreter-exec console \"break main\"");
        assert_eq!(cmds[1], "-gdb-set mi-async on");
        assert_eq!(cmds[2], "-gdb-set non-stop off");
        assert_eq!(cmds[3], "continue");
    }

    #[test]
    fn remote_attach_sequence_matches_original_order() {
        let mut s = spec();
        s.start_mode = ComponentStartMode::Attach;
        s.attach_pid = 4242;
        s.extension_path = "/opt/ext.py".to_owned();
        s.initialize_commands = vec!["-break-insert main".to_owned()];

        let cmds = remote_attach_configure_commands(&s, true);
        assert_eq!(
            cmds,
            vec![
                "-gdb-set logging enabled on".to_owned(),
                "-gdb-set mi-async on".to_owned(),
                "-interpreter-exec console \"source /opt/ext.py\"".to_owned(),
                "-interpreter-exec console \"break main\"".to_owned(),
                "-break-insert main".to_owned(),
                "-target-attach 4242".to_owned(),
                "-interpreter-exec console \"signal SIG40\"".to_owned(),
                "continue".to_owned(),
            ]
        );
    }

    #[test]
    fn remote_attach_sequence_omits_signal_when_discovery_inactive() {
        let mut s = spec();
        s.start_mode = ComponentStartMode::Attach;
        let cmds = remote_attach_configure_commands(&s, false);
        assert!(!cmds.iter().any(|c| c.contains("SIG40")));
    }

    #[test]
    fn remote_binary_sequence_does_not_console_wrap_prerun() {
        let mut s = spec();
        s.mode = SessionMode::Remote;
        let cmds = remote_binary_configure_commands(&s);
        assert_eq!(cmds[0], "-gdb-set mi-async on");
        assert_eq!(cmds[1], "break main");
        assert_eq!(cmds[2], "-file-exec-and-symbols /srv/app");
        assert_eq!(cmds[3], "-exec-arguments --flag");
    }
}

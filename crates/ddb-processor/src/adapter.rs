//! The pluggable per-framework remote-backtrace adapter, grounded in
//! `original_source/ddb/iddb/framework_adoption.py`'s `FrameWorkAdapter`
//! and its `GRPCAdapter`/`ServiceWeaverAdapter` implementations.

use ddb_config::Framework;

/// What a remote-backtrace step needs that varies by framework: the MI
/// command name that asks the target for its caller's metadata, and how
/// to turn that metadata into the session tag (`"<ip>:-<pid>"`) used to
/// look the parent session up.
pub trait FrameworkAdapter: Send + Sync {
    /// The MI command that asks the current frame for its caller's
    /// location (`GRPCAdapter`'s `-get-remote-bt`, `ServiceWeaverAdapter`'s
    /// `-serviceweaver-bt-remote`).
    fn bt_command_name(&self) -> &'static str;

    /// Builds the session tag a caller's metadata resolves to, or `None`
    /// if the metadata can't be resolved to a tag.
    fn extract_tag(&self, pid: u64, ip: u32) -> Option<String>;
}

/// The default/Nu adapter: caller metadata is `{pid, ip}` and the tag is
/// `"<ip>:-<pid>"`, matching `GRPCAdapter`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NuAdapter;

impl FrameworkAdapter for NuAdapter {
    fn bt_command_name(&self) -> &'static str {
        "-get-remote-bt"
    }

    fn extract_tag(&self, pid: u64, ip: u32) -> Option<String> {
        Some(format!("{}:-{pid}", ip_int_to_str(ip)))
    }
}

/// The ServiceWeaver adapter: caller metadata identifies only a host, not
/// a pid, matching `ServiceWeaverAdapter`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceWeaverAdapter;

impl FrameworkAdapter for ServiceWeaverAdapter {
    fn bt_command_name(&self) -> &'static str {
        "-serviceweaver-bt-remote"
    }

    fn extract_tag(&self, _pid: u64, ip: u32) -> Option<String> {
        Some(ip_int_to_str(ip))
    }
}

/// Picks the adapter matching a parsed config's `Framework`, falling back
/// to the Nu adapter for `VanillaPid` (the original's raw-pid discovery
/// path has no framework-specific remote-backtrace wiring of its own).
#[must_use]
pub fn adapter_for(framework: Framework) -> Box<dyn FrameworkAdapter> {
    match framework {
        Framework::Nu | Framework::Unspecified | Framework::VanillaPid => Box::new(NuAdapter),
        Framework::ServiceWeaverKube => Box::new(ServiceWeaverAdapter),
    }
}

/// `socket.inet_ntoa(struct.pack('!L', ip_int))`: big-endian dotted-quad.
fn ip_int_to_str(ip: u32) -> String {
    let octets = ip.to_be_bytes();
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nu_adapter_formats_ip_colon_dash_pid() {
        let adapter = NuAdapter;
        let ip = u32::from_be_bytes([10, 0, 0, 1]);
        assert_eq!(adapter.extract_tag(1234, ip).as_deref(), Some("10.0.0.1:-1234"));
    }

    #[test]
    fn serviceweaver_adapter_ignores_pid() {
        let adapter = ServiceWeaverAdapter;
        let ip = u32::from_be_bytes([192, 168, 1, 1]);
        assert_eq!(adapter.extract_tag(0, ip).as_deref(), Some("192.168.1.1"));
    }
}

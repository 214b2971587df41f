//! Small shared enums for thread, session and exit-handling state.

/// Run state of a single thread, as tracked by the state manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadStatus {
    /// The thread is executing.
    Running,
    /// The thread is stopped (breakpoint, signal, step completion, ...).
    Stopped,
}

/// Run state of a thread group (inferior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadGroupStatus {
    /// The inferior has been created but not yet started.
    Created,
    /// The inferior is running.
    Running,
    /// The inferior has exited.
    Exited,
}

/// How a session attaches to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StartMode {
    /// GDB loads and launches the binary itself.
    Binary,
    /// GDB attaches to an already-running process by pid.
    Attach,
}

/// What a session does with its target on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OnExit {
    /// Kill the target process.
    Kill,
    /// Detach, leaving the target running.
    Detach,
}

impl Default for OnExit {
    fn default() -> Self {
        Self::Detach
    }
}

/// The lifecycle state of one [`crate::ids::Sid`]-identified session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    /// Constructed but not yet started.
    Idle,
    /// Transport is connecting.
    Starting,
    /// Transport connected; prerun/init/attach commands are being issued.
    Configuring,
    /// Fully attached and accepting routed commands.
    Ready,
    /// Shutdown in progress.
    Closing,
    /// Transport closed, session removed from the orchestrator.
    Closed,
}

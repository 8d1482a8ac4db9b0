//! Per-fd and per-task state, modeled as tagged sum types with
//! per-variant operation tables rather than virtual dispatch.

use std::fmt;

/// Lifecycle state of a cooperative task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Runnable,
    Running,
    Suspended,
    Dead,
}

impl TaskState {
    pub fn is_runnable(self) -> bool {
        matches!(self, TaskState::Runnable)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Dead)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Runnable => "runnable",
            TaskState::Running => "running",
            TaskState::Suspended => "suspended",
            TaskState::Dead => "dead",
        };
        write!(f, "{s}")
    }
}

/// File descriptor lifecycle. `Closed` rejects every operation with `EBADF`;
/// every other variant carries the fd and exposes only the operations its
/// access mode allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Closed,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl FileState {
    pub fn can_read(self) -> bool {
        matches!(self, FileState::ReadOnly | FileState::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, FileState::WriteOnly | FileState::ReadWrite)
    }

    /// `Closed` -> stays `Closed`; everything else -> `Closed`. The only
    /// legal transition in the whole automaton.
    pub fn on_close(self) -> FileState {
        FileState::Closed
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Closed => "closed",
            FileState::ReadOnly => "read-only",
            FileState::WriteOnly => "write-only",
            FileState::ReadWrite => "read-write",
        };
        write!(f, "{s}")
    }
}

/// Socket lifecycle per §3/§4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Closed,
    Bound,
    Connecting,
    Connected,
    Listening,
}

impl SocketState {
    pub fn on_bind_ok(self) -> SocketState {
        SocketState::Bound
    }

    pub fn on_connect_started(self) -> SocketState {
        SocketState::Connecting
    }

    pub fn on_connect_resolved(self, so_error: i32) -> SocketState {
        if so_error == 0 {
            SocketState::Connected
        } else {
            SocketState::Closed
        }
    }

    pub fn on_listen_ok(self) -> SocketState {
        SocketState::Listening
    }

    /// `bind`/`connect` are one-shot: only legal from `Closed`.
    pub fn can_bind(self) -> bool {
        matches!(self, SocketState::Closed)
    }

    pub fn can_connect(self) -> bool {
        matches!(self, SocketState::Closed)
    }

    pub fn can_listen(self) -> bool {
        matches!(self, SocketState::Bound)
    }

    pub fn can_accept(self) -> bool {
        matches!(self, SocketState::Listening)
    }

    pub fn can_send_recv(self) -> bool {
        matches!(self, SocketState::Connected)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketState::Closed => "closed",
            SocketState::Bound => "bound",
            SocketState::Connecting => "connecting",
            SocketState::Connected => "connected",
            SocketState::Listening => "listening",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_access_modes() {
        assert!(FileState::ReadOnly.can_read());
        assert!(!FileState::ReadOnly.can_write());
        assert!(FileState::WriteOnly.can_write());
        assert!(!FileState::WriteOnly.can_read());
        assert!(FileState::ReadWrite.can_read() && FileState::ReadWrite.can_write());
        assert!(!FileState::Closed.can_read() && !FileState::Closed.can_write());
    }

    #[test]
    fn file_close_is_absorbing() {
        assert_eq!(FileState::ReadWrite.on_close(), FileState::Closed);
        assert_eq!(FileState::Closed.on_close(), FileState::Closed);
    }

    #[test]
    fn socket_bind_connect_one_shot() {
        assert!(SocketState::Closed.can_bind());
        assert!(!SocketState::Bound.can_bind());
        assert!(!SocketState::Connected.can_connect());
    }

    #[test]
    fn socket_connect_resolution() {
        assert_eq!(SocketState::Connecting.on_connect_resolved(0), SocketState::Connected);
        assert_eq!(SocketState::Connecting.on_connect_resolved(111), SocketState::Closed);
    }

    #[test]
    fn task_state_predicates() {
        assert!(TaskState::Runnable.is_runnable());
        assert!(!TaskState::Suspended.is_runnable());
        assert!(TaskState::Dead.is_terminal());
    }
}

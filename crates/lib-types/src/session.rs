//! Runtime session lifecycle states.

use std::fmt;

/// Construction stage of a runtime session.
///
/// The progression is strictly linear. A session handle is only handed
/// out once it reaches [`SessionState::ModuleLoaded`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// Nothing allocated yet.
    Uninitialized,
    /// Runtime instance created.
    InstanceReady,
    /// Device created on one of the preferred drivers.
    DeviceReady,
    /// Runtime session bound to the device.
    SessionReady,
    /// Module image appended; the session can be invoked.
    ModuleLoaded,
}

impl SessionState {
    /// The state reached by the next successful construction step.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::InstanceReady),
            Self::InstanceReady => Some(Self::DeviceReady),
            Self::DeviceReady => Some(Self::SessionReady),
            Self::SessionReady => Some(Self::ModuleLoaded),
            Self::ModuleLoaded => None,
        }
    }

    /// Whether entry points can be invoked in this state.
    pub fn is_ready(self) -> bool {
        self == Self::ModuleLoaded
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::InstanceReady => "instance-ready",
            Self::DeviceReady => "device-ready",
            Self::SessionReady => "session-ready",
            Self::ModuleLoaded => "module-loaded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_linear() {
        let mut state = SessionState::Uninitialized;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            visited.push(state);
        }
        assert_eq!(visited.len(), 5);
        assert!(state.is_ready());
        assert!(!SessionState::SessionReady.is_ready());
    }
}

use std::fmt;

/// Lifecycle of one allocator instance.
///
/// `Unclaimed -> Scanning -> (Registering | Claiming) -> Verifying? -> Owned`.
/// A conceded verification goes back to `Registering`. `Stopped` is reached only
/// through an explicit shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaseState {
    #[default]
    Unclaimed,
    Scanning,
    Registering,
    Claiming,
    Verifying,
    Owned,
    Stopped,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeaseState::Unclaimed => "unclaimed",
            LeaseState::Scanning => "scanning",
            LeaseState::Registering => "registering",
            LeaseState::Claiming => "claiming",
            LeaseState::Verifying => "verifying",
            LeaseState::Owned => "owned",
            LeaseState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

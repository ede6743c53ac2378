//! Mode sets and transition tables.
//!
//! Every actor type has a closed mode enum implementing [`ActorMode`]. The
//! enum carries its own transition table in [`ActorMode::successors`], so
//! legality is a static lookup.

use std::fmt;
use std::hash::Hash;

/// A closed set of actor modes with a static transition table.
pub trait ActorMode: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const INIT: Self;
    const ERROR: Self;
    const RESET: Self;
    const SHUTDOWN: Self;

    /// Every mode of the set.
    const ALL: &'static [Self];

    /// Canonical upper-case name, mirrored into shared state.
    fn as_str(&self) -> &'static str;

    /// Modes reachable directly from `self`.
    fn successors(&self) -> &'static [Self];
}

/// Table lookup: is `to` listed under `from`?
pub fn valid_transition<M: ActorMode>(from: M, to: M) -> bool {
    from.successors().contains(&to)
}

/// Parse a canonical mode name.
pub fn parse_mode<M: ActorMode>(name: &str) -> Option<M> {
    M::ALL.iter().copied().find(|mode| mode.as_str() == name)
}

/// Generic lifecycle shared by satellites, peripherals and controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleMode {
    Init,
    Normal,
    Reset,
    Error,
    Shutdown,
}

impl ActorMode for LifecycleMode {
    const INIT: Self = Self::Init;
    const ERROR: Self = Self::Error;
    const RESET: Self = Self::Reset;
    const SHUTDOWN: Self = Self::Shutdown;

    const ALL: &'static [Self] = &[
        Self::Init,
        Self::Normal,
        Self::Reset,
        Self::Error,
        Self::Shutdown,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Normal => "NORMAL",
            Self::Reset => "RESET",
            Self::Error => "ERROR",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use LifecycleMode::*;
        match self {
            Init => &[Normal, Error, Shutdown],
            Normal => &[Reset, Error, Shutdown],
            Reset => &[Init, Error, Shutdown],
            Error => &[Reset, Shutdown],
            Shutdown => &[],
        }
    }
}

impl fmt::Display for LifecycleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleMode::*;

    #[test]
    fn lifecycle_table() {
        assert!(valid_transition(Init, Normal));
        assert!(valid_transition(Normal, Reset));
        assert!(valid_transition(Reset, Init));
        assert!(valid_transition(Error, Reset));

        assert!(!valid_transition(Init, Reset));
        assert!(!valid_transition(Error, Normal));
        assert!(!valid_transition(Error, Init));
        assert!(!valid_transition(Normal, Init));
    }

    #[test]
    fn shutdown_is_terminal_and_reachable() {
        for mode in LifecycleMode::ALL {
            if *mode != Shutdown {
                assert!(valid_transition(*mode, Shutdown), "{mode} cannot shut down");
            }
        }
        assert!(Shutdown.successors().is_empty());
    }

    #[test]
    fn no_self_transitions() {
        for mode in LifecycleMode::ALL {
            assert!(!valid_transition(*mode, *mode));
        }
    }

    #[test]
    fn names_parse_back() {
        for mode in LifecycleMode::ALL {
            assert_eq!(parse_mode::<LifecycleMode>(mode.as_str()), Some(*mode));
        }
        assert_eq!(parse_mode::<LifecycleMode>("normal"), None);
    }
}

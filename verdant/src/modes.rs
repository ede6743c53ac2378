//! Coordinator modes.

use std::fmt;
use verdant_common::actor::ActorMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorMode {
    Init,
    Config,
    Setup,
    Normal,
    Load,
    Reset,
    Error,
    Shutdown,
}

impl ActorMode for CoordinatorMode {
    const INIT: Self = Self::Init;
    const ERROR: Self = Self::Error;
    const RESET: Self = Self::Reset;
    const SHUTDOWN: Self = Self::Shutdown;

    const ALL: &'static [Self] = &[
        Self::Init,
        Self::Config,
        Self::Setup,
        Self::Normal,
        Self::Load,
        Self::Reset,
        Self::Error,
        Self::Shutdown,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Config => "CONFIG",
            Self::Setup => "SETUP",
            Self::Normal => "NORMAL",
            Self::Load => "LOAD",
            Self::Reset => "RESET",
            Self::Error => "ERROR",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use CoordinatorMode::*;
        match self {
            Init => &[Config, Error, Shutdown],
            Config => &[Setup, Error, Shutdown],
            Setup => &[Normal, Error, Shutdown],
            Normal => &[Load, Error, Shutdown],
            Load => &[Config, Error, Shutdown],
            Error => &[Reset, Shutdown],
            Reset => &[Init, Shutdown],
            Shutdown => &[],
        }
    }
}

impl fmt::Display for CoordinatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

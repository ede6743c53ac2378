//! Recipe engine modes.

use std::fmt;
use verdant_common::actor::ActorMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeMode {
    Init,
    NoRecipe,
    Start,
    Queued,
    Normal,
    Pause,
    Stop,
    Reset,
    Error,
    Shutdown,
}

impl RecipeMode {
    /// Modes the engine may resume into after a restart.
    pub fn is_resumable(&self) -> bool {
        matches!(self, RecipeMode::Queued | RecipeMode::Normal | RecipeMode::Pause)
    }
}

impl ActorMode for RecipeMode {
    const INIT: Self = Self::Init;
    const ERROR: Self = Self::Error;
    const RESET: Self = Self::Reset;
    const SHUTDOWN: Self = Self::Shutdown;

    const ALL: &'static [Self] = &[
        Self::Init,
        Self::NoRecipe,
        Self::Start,
        Self::Queued,
        Self::Normal,
        Self::Pause,
        Self::Stop,
        Self::Reset,
        Self::Error,
        Self::Shutdown,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::NoRecipe => "NORECIPE",
            Self::Start => "START",
            Self::Queued => "QUEUED",
            Self::Normal => "NORMAL",
            Self::Pause => "PAUSE",
            Self::Stop => "STOP",
            Self::Reset => "RESET",
            Self::Error => "ERROR",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use RecipeMode::*;
        match self {
            // INIT may resume a stored mode.
            Init => &[NoRecipe, Queued, Normal, Pause, Error, Shutdown],
            NoRecipe => &[Start, Error, Shutdown],
            // A recipe that fails to start falls back to NORECIPE.
            Start => &[Queued, NoRecipe, Error, Shutdown],
            Queued => &[Normal, Stop, Error, Shutdown],
            Normal => &[Pause, Stop, Error, Shutdown],
            Pause => &[Start, Error, Shutdown],
            Stop => &[NoRecipe, Error, Shutdown],
            Error => &[Reset, Shutdown],
            Reset => &[Init, Shutdown],
            Shutdown => &[],
        }
    }
}

impl fmt::Display for RecipeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

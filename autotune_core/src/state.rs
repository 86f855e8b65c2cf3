//! Autotuner lifecycle states.

use core::fmt;

/// Phase that a recenter maneuver interrupted and returns to once the
/// mechanism crosses the center line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resume {
    FindingMaxVel,
    Tuning,
}

impl Resume {
    pub const fn state(self) -> TunerState {
        match self {
            Resume::FindingMaxVel => TunerState::FindingMaxVel,
            Resume::Tuning => TunerState::Tuning,
        }
    }
}

/// Current state of a `MotorAutotuner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunerState {
    /// Setup or paused: nothing recorded, output 0.
    #[default]
    Idle,
    /// Initial sweep discovering the velocity extremes.
    FindingMaxVel,
    /// Recording into the grid while supervising the soft bounds.
    Tuning,
    /// Out of the soft bounds; driving back across center at full voltage.
    Recenter { resume: Resume },
    /// Session ended; output frozen at 0 pending export.
    Calculating,
}

impl TunerState {
    pub const fn name(&self) -> &'static str {
        match self {
            TunerState::Idle => "IDLE",
            TunerState::FindingMaxVel => "FINDING_MAX_VEL",
            TunerState::Tuning => "TUNING",
            TunerState::Recenter { .. } => "RECENTER",
            TunerState::Calculating => "CALCULATING",
        }
    }

    /// True when the tuner, not the external excitation path, owns the output.
    pub const fn is_overriding(&self) -> bool {
        matches!(self, TunerState::Recenter { .. })
    }

    pub const fn is_recording(&self) -> bool {
        !matches!(self, TunerState::Idle)
    }
}

impl fmt::Display for TunerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

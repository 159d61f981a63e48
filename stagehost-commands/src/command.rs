/// Step size for NxN rectangle scans. The grid pitch for this mode is a
/// protocol constant, not operator-settable like the manual rectangle's.
pub const RECT_NXN_STEP_MM: f64 = 0.2;

/// Step size for automatic circle scans.
pub const CIRCLE_AUTO_STEP_MM: f64 = 0.2;

/// Point count for automatic circle scans.
pub const CIRCLE_AUTO_POINTS: u32 = 30;

/// The controller stores four circle presets, addressed 0 through 3.
pub const CIRCLE_INDEX_MAX: u32 = 3;

/// Jog direction. The wire tokens reuse the literal W/A/S/D key symbols
/// the controller firmware expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Left,
    Backward,
    Right,
}

impl Direction {
    /// Every direction, in the order jog commands are emitted.
    pub const ALL: [Direction; 4] = [
        Direction::Forward,
        Direction::Left,
        Direction::Backward,
        Direction::Right,
    ];

    pub fn token(self) -> char {
        match self {
            Direction::Forward => 'W',
            Direction::Left => 'A',
            Direction::Backward => 'S',
            Direction::Right => 'D',
        }
    }

    pub fn from_token(token: char) -> Option<Self> {
        match token.to_ascii_uppercase() {
            'W' => Some(Direction::Forward),
            'A' => Some(Direction::Left),
            'S' => Some(Direction::Backward),
            'D' => Some(Direction::Right),
            _ => None,
        }
    }
}

/// One controller command, produced by the validating constructors below
/// and consumed once by the encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ManualJog { direction: Direction, step_mm: f64 },
    ManualStop,
    ManualSetCenter,
    ManualScan,
    RectNxN { x_count: u32, y_count: u32, step_mm: f64 },
    RectManual { total_scans: u32, step_mm: f64 },
    Circle { index: u32, step_mm: f64, total_points: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Step sizes must be positive reals; there is deliberately no upper
/// bound, the operator is trusted.
pub(crate) fn step_mm(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError {
            field,
            reason: "step size must be a positive number",
        })
    }
}

fn circle_index(index: u32) -> Result<u32, ValidationError> {
    if index <= CIRCLE_INDEX_MAX {
        Ok(index)
    } else {
        Err(ValidationError {
            field: "index",
            reason: "circle index must be between 0 and 3",
        })
    }
}

impl Command {
    pub fn manual_jog(direction: Direction, step: f64) -> Result<Self, ValidationError> {
        Ok(Self::ManualJog {
            direction,
            step_mm: step_mm("step_mm", step)?,
        })
    }

    /// NxN rectangle scan. Counts are free; the step size is fixed by the
    /// protocol.
    pub fn rect_nxn(x_count: u32, y_count: u32) -> Self {
        Self::RectNxN {
            x_count,
            y_count,
            step_mm: RECT_NXN_STEP_MM,
        }
    }

    pub fn rect_manual(total_scans: u32, step: f64) -> Result<Self, ValidationError> {
        Ok(Self::RectManual {
            total_scans,
            step_mm: step_mm("step_mm", step)?,
        })
    }

    pub fn circle(index: u32, step: f64, total_points: u32) -> Result<Self, ValidationError> {
        Ok(Self::Circle {
            index: circle_index(index)?,
            step_mm: step_mm("step_mm", step)?,
            total_points,
        })
    }

    /// Automatic circle scan. Step size and point count are fixed by the
    /// protocol; only the preset index is chosen.
    pub fn circle_auto(index: u32) -> Result<Self, ValidationError> {
        Ok(Self::Circle {
            index: circle_index(index)?,
            step_mm: CIRCLE_AUTO_STEP_MM,
            total_points: CIRCLE_AUTO_POINTS,
        })
    }

    /// Whether this command engages the busy lock. Gated commands are
    /// refused while the controller is busy; jog, stop and set-center
    /// always go through so the stage stays responsive.
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            Self::ManualScan | Self::RectNxN { .. } | Self::RectManual { .. } | Self::Circle { .. }
        )
    }
}

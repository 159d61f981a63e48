use crate::command::{self, Direction, ValidationError};

/// Default manual step size in millimetres.
pub const DEFAULT_STEP_MM: f64 = 0.5;

/// The set of currently-held jog keys plus the active step size.
///
/// Read once per jog tick. Directions are stored in the fixed W/A/S/D
/// order so the emitted command stream is deterministic no matter the
/// order keys were pressed in.
#[derive(Debug)]
pub struct JogIntent {
    held: [bool; 4],
    step_mm: f64,
}

impl Default for JogIntent {
    fn default() -> Self {
        Self {
            held: [false; 4],
            step_mm: DEFAULT_STEP_MM,
        }
    }
}

impl JogIntent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_mm(&self) -> f64 {
        self.step_mm
    }

    /// Change the step size for subsequent jogs. Input surfaces only
    /// guarantee the value is numeric; the domain is enforced here.
    pub fn set_step(&mut self, step: f64) -> Result<(), ValidationError> {
        self.step_mm = command::step_mm("step_mm", step)?;
        Ok(())
    }

    pub fn is_held(&self, direction: Direction) -> bool {
        self.held[slot(direction)]
    }

    pub fn is_empty(&self) -> bool {
        self.held.iter().all(|held| !held)
    }

    pub fn press(&mut self, direction: Direction) {
        self.held[slot(direction)] = true;
    }

    /// Release a key. Returns true when this release emptied the held
    /// set, which is the one moment a stop must go out.
    pub fn release(&mut self, direction: Direction) -> bool {
        let slot = slot(direction);
        let was_held = self.held[slot];
        self.held[slot] = false;
        was_held && self.is_empty()
    }

    /// Drop all held keys, returning true if any were held.
    pub fn clear(&mut self) -> bool {
        let any = !self.is_empty();
        self.held = [false; 4];
        any
    }
}

fn slot(direction: Direction) -> usize {
    match direction {
        Direction::Forward => 0,
        Direction::Left => 1,
        Direction::Backward => 2,
        Direction::Right => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_fires_only_when_set_empties() {
        let mut jog = JogIntent::new();
        jog.press(Direction::Forward);
        jog.press(Direction::Right);

        assert!(!jog.release(Direction::Forward));
        assert!(jog.release(Direction::Right));
        assert!(jog.is_empty());
    }

    #[test]
    fn releasing_unheld_key_is_inert() {
        let mut jog = JogIntent::new();
        assert!(!jog.release(Direction::Left));

        jog.press(Direction::Forward);
        assert!(!jog.release(Direction::Left));
        assert!(!jog.is_empty());
    }

    #[test]
    fn press_is_idempotent() {
        let mut jog = JogIntent::new();
        jog.press(Direction::Backward);
        jog.press(Direction::Backward);
        assert!(jog.release(Direction::Backward));
    }

    #[test]
    fn clear_reports_whether_keys_were_held() {
        let mut jog = JogIntent::new();
        assert!(!jog.clear());
        jog.press(Direction::Left);
        assert!(jog.clear());
        assert!(jog.is_empty());
    }

    #[test]
    fn step_is_domain_checked() {
        let mut jog = JogIntent::new();
        assert_eq!(jog.step_mm(), DEFAULT_STEP_MM);
        jog.set_step(1.5).unwrap();
        assert_eq!(jog.step_mm(), 1.5);
        assert!(jog.set_step(0.0).is_err());
        assert!(jog.set_step(-2.0).is_err());
        assert_eq!(jog.step_mm(), 1.5);
    }
}

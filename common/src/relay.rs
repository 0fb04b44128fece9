use crate::error::RelayError;

/// A single heating output. The controller is the only caller; it never
/// commands a state the relay is already in.
pub trait Relay {
    fn set(&mut self, on: bool) -> Result<(), RelayError>;

    /// Last commanded state.
    fn is_on(&self) -> bool;

    /// Returns the device to a neutral state. Safe to call more than once.
    fn release(&mut self) -> Result<(), RelayError>;
}

/// Relay that only records what it was told. Backs `--dry-run` and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    on: bool,
    pulses: Vec<bool>,
    released: bool,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every physical command in order, `true` for ON.
    pub fn pulses(&self) -> &[bool] {
        &self.pulses
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Relay for MemoryRelay {
    fn set(&mut self, on: bool) -> Result<(), RelayError> {
        if self.released {
            return Err(RelayError::Released);
        }
        self.on = on;
        self.pulses.push(on);
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }

    fn release(&mut self) -> Result<(), RelayError> {
        self.on = false;
        self.released = true;
        Ok(())
    }
}

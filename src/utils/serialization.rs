//! # Optimizer State Serialization
//!
//! Functions for saving and loading optimizer state (momentum buffers, moment
//! estimates, group learning rates) so a run can resume where it stopped.
//! Uses `serde` for serialization and `bincode` as the binary format.
//!
//! Model weights are not part of this file; save them with whatever the model
//! uses.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::optim::{OptimError, Optimizer, StateDict, UpdateRule};

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Optimizer state rejected: {0}")]
    Optim(#[from] OptimError),
}

// --- Save / Load Functions ---

/// Writes a state dictionary to `path`.
pub fn save_state<P: AsRef<Path>>(state: &StateDict, path: P) -> Result<(), SerializationError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, state)?;
    writer.flush()?;

    debug!(
        "saved {} state ({} slots) to {}",
        state.optimizer_type,
        state.slots.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads a state dictionary from `path`.
pub fn load_state<P: AsRef<Path>>(path: P) -> Result<StateDict, SerializationError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let state: StateDict = bincode::deserialize_from(reader)?;

    debug!(
        "read {} state ({} slots) from {}",
        state.optimizer_type,
        state.slots.len(),
        path.as_ref().display()
    );
    Ok(state)
}

/// Saves an optimizer's current state to `path`.
pub fn save<R, P>(optimizer: &Optimizer<R>, path: P) -> Result<(), SerializationError>
where
    R: UpdateRule,
    P: AsRef<Path>,
{
    save_state(&optimizer.state_dict(), path)
}

/// Loads state from `path` into an optimizer built with the same rule and
/// parameter layout.
pub fn load<R, P>(optimizer: &mut Optimizer<R>, path: P) -> Result<(), SerializationError>
where
    R: UpdateRule,
    P: AsRef<Path>,
{
    let state = load_state(path)?;
    optimizer.load_state_dict(&state)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("rtorch_optim_does_not_exist.bin");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(load_state(&path), Err(SerializationError::Io(_))));
    }
}

//! # Optimizer State
//!
//! Per-parameter accumulators live in an [`OptimizerState`] owned by the
//! optimizer, addressed by a stable [`SlotKey`]. Each slot starts empty and is
//! filled the first time `step` visits its parameter.
//!
//! [`StateDict`] is the serializable snapshot used to save and restore a
//! run's accumulators.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use super::config::Recurrence;
use super::param_group::GroupOptions;
use super::OptimError;
use crate::tensor::{TensorData, TensorError};

// --- Slot addressing ---

/// Position of a parameter: group index, then index within the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub group: usize,
    pub index: usize,
}

impl SlotKey {
    pub fn new(group: usize, index: usize) -> Self {
        SlotKey { group, index }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.index)
    }
}

// --- SlotState Trait ---

/// Accumulator record kept for one parameter.
pub trait SlotState: Sized {
    /// Shape of the accumulators; equals the parameter's gradient shape.
    fn shape(&self) -> &[usize];

    fn to_record(&self) -> SlotRecord;

    fn from_record(record: &SlotRecord) -> Result<Self, OptimError>;
}

// --- State container ---

/// All slots of one optimizer, `slots[group][index]`.
#[derive(Clone, Debug)]
pub struct OptimizerState<S> {
    slots: Vec<Vec<Option<S>>>,
}

impl<S> OptimizerState<S> {
    pub(crate) fn new() -> Self {
        OptimizerState { slots: Vec::new() }
    }

    /// Adds an uninitialized slot row for a new group of `len` parameters.
    pub(crate) fn push_group(&mut self, len: usize) {
        self.slots.push(std::iter::repeat_with(|| None).take(len).collect());
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [Vec<Option<S>>] {
        &mut self.slots
    }

    pub fn get(&self, key: SlotKey) -> Option<&S> {
        self.slots.get(key.group)?.get(key.index)?.as_ref()
    }

    pub fn is_initialized(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of initialized slots.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Initialized slots in key order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &S)> + '_ {
        self.slots.iter().enumerate().flat_map(|(group, row)| {
            row.iter().enumerate().filter_map(move |(index, slot)| {
                slot.as_ref().map(|s| (SlotKey::new(group, index), s))
            })
        })
    }
}

impl<S> Default for OptimizerState<S> {
    fn default() -> Self {
        Self::new()
    }
}

// --- Serializable records ---

/// Flat copy of an array: shape plus row-major data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializableTensor {
    pub shape: Vec<usize>,
    pub data: Vec<TensorData>,
}

impl SerializableTensor {
    pub fn from_array(array: &ArrayD<TensorData>) -> Self {
        SerializableTensor {
            shape: array.shape().to_vec(),
            // `iter()` walks in logical order regardless of memory layout.
            data: array.iter().copied().collect(),
        }
    }

    pub fn to_array(&self) -> Result<ArrayD<TensorData>, TensorError> {
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone())?)
    }
}

/// One slot's accumulators by name, plus its visit count.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub step: u64,
    pub buffers: BTreeMap<String, SerializableTensor>,
}

impl SlotRecord {
    pub fn with_buffer(mut self, name: &str, array: &ArrayD<TensorData>) -> Self {
        self.buffers.insert(name.to_string(), SerializableTensor::from_array(array));
        self
    }

    /// Restores a named buffer.
    pub fn buffer(&self, name: &str) -> Result<ArrayD<TensorData>, OptimError> {
        let tensor = self
            .buffers
            .get(name)
            .ok_or_else(|| OptimError::IncompatibleState(format!("missing buffer '{name}'")))?;
        Ok(tensor.to_array()?)
    }
}

/// Snapshot of an optimizer: rule name and recurrence, group options and
/// initialized slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub optimizer_type: String,
    pub recurrence: Recurrence,
    pub groups: Vec<GroupRecord>,
    pub slots: BTreeMap<SlotKey, SlotRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub options: GroupOptions,
    pub len: usize,
}

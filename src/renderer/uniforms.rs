//! Per-program uniform value cache.
//!
//! Setting a uniform never talks to the device. Values are cached per
//! (program, location) and compared against what was last stored; only
//! actual differences are flagged. When a draw ends the flagged slots are
//! snapshotted into the frame's change array and applied lazily during
//! execution. Re-setting an equal value is therefore free, which is what
//! makes batch merging effective.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::geometry::RoundedRect;

/// A uniform payload, tagged by the device call used to apply it.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Int(i32),
    /// Sampler slot; applied as an int uniform.
    Texture(i32),
    FloatArray(SmallVec<[f32; 8]>),
    /// Row-major matrix, transposed to columns on application.
    Matrix([f32; 16]),
    Color([f32; 4]),
    RoundedRect {
        rect: RoundedRect,
        /// Whether the corner data must be sent alongside the bounds.
        send_corners: bool,
    },
}

/// One recorded change: apply `value` at `location` of the batch's program.
#[derive(Debug, Clone)]
pub struct UniformChange {
    pub location: i32,
    pub value: UniformValue,
}

#[derive(Debug)]
struct Slot {
    value: UniformValue,
    changed: bool,
}

/// The cache itself, keyed by program id, slots indexed by location.
///
/// Shared between renderer instances on the same device so that program
/// state survives across frames and renderers.
#[derive(Debug, Default)]
pub struct UniformState {
    programs: HashMap<u32, Vec<Option<Slot>>>,
}

impl UniformState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for (program, location), flagging the slot only if the
    /// value actually differs from what is cached.
    pub fn set(&mut self, program: u32, location: i32, value: UniformValue) {
        assert!(location >= 0, "uniform location must be resolved");
        let slots = self.programs.entry(program).or_default();
        let index = location as usize;
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }

        match &mut slots[index] {
            Some(slot) => {
                if slot.value != value {
                    slot.value = value;
                    slot.changed = true;
                }
            }
            empty => {
                *empty = Some(Slot {
                    value,
                    changed: true,
                });
            }
        }
    }

    /// Drain every flagged slot of `program` into `out`, clearing the flags.
    /// Returns how many changes were appended.
    pub fn snapshot(&mut self, program: u32, out: &mut Vec<UniformChange>) -> usize {
        let mut count = 0;
        if let Some(slots) = self.programs.get_mut(&program) {
            for (location, slot) in slots.iter_mut().enumerate() {
                if let Some(slot) = slot {
                    if slot.changed {
                        slot.changed = false;
                        out.push(UniformChange {
                            location: location as i32,
                            value: slot.value.clone(),
                        });
                        count += 1;
                    }
                }
            }
        }
        count
    }

    /// Drop everything cached for a program id, e.g. when it is deleted and
    /// the id may be reused by the device.
    pub fn clear_program(&mut self, program: u32) {
        self.programs.remove(&program);
    }
}

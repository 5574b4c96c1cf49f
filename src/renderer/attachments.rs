//! Recorded framebuffer and texture-unit bindings.
//!
//! Bindings made while recording a frame do not touch the device; they are
//! tracked here and snapshotted into draw batches, then applied lazily
//! during execution. A change flag per binding makes redundant rebinds free.

/// Number of texture units tracked per context.
pub const N_TEXTURE_UNITS: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Binding {
    pub id: u32,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct AttachmentState {
    pub framebuffer: Binding,
    pub textures: [Binding; N_TEXTURE_UNITS],
}

impl AttachmentState {
    pub fn new() -> Self {
        Self {
            framebuffer: Binding::default(),
            textures: [Binding::default(); N_TEXTURE_UNITS],
        }
    }

    pub fn bind_framebuffer(&mut self, id: u32) {
        if self.framebuffer.id != id {
            self.framebuffer.id = id;
            self.framebuffer.changed = true;
        }
    }

    pub fn bind_texture(&mut self, unit: u32, id: u32) {
        assert!((unit as usize) < N_TEXTURE_UNITS, "texture unit {unit} out of range");
        let binding = &mut self.textures[unit as usize];
        if binding.id != id {
            binding.id = id;
            binding.changed = true;
        }
    }

    /// Reinstate a previously saved snapshot. Units whose id differs from
    /// the current one are flagged so the next draw re-records the bind;
    /// flags pending in the snapshot survive.
    pub fn restore_from(&mut self, saved: AttachmentState) {
        let mut restored = saved;
        restored.framebuffer.changed =
            restored.framebuffer.changed || restored.framebuffer.id != self.framebuffer.id;
        for (unit, binding) in restored.textures.iter_mut().enumerate() {
            if binding.id != self.textures[unit].id && binding.id != 0 {
                binding.changed = true;
            }
        }
        *self = restored;
    }
}

impl Default for AttachmentState {
    fn default() -> Self {
        Self::new()
    }
}

//! Session arena
//!
//! Every string and blob that crosses the host/database boundary during a
//! session is copied into the session's [`Arena`]. Values borrowed from it live
//! exactly as long as the session; dropping (or resetting) the arena frees them
//! all at once.

use bumpalo::Bump;

/// Bump allocator owned by a session
pub struct Arena {
    bump: Bump,
}

impl Arena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Create an arena with a pre-allocated first chunk
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bump: Bump::with_capacity(capacity),
        }
    }

    /// Copy a string into the arena
    #[inline]
    pub fn alloc_str(&self, value: &str) -> &str {
        self.bump.alloc_str(value)
    }

    /// Copy a byte slice into the arena
    #[inline]
    pub fn alloc_bytes(&self, value: &[u8]) -> &[u8] {
        self.bump.alloc_slice_copy(value)
    }

    /// Move an owned string into the arena
    pub fn alloc_string(&self, value: String) -> &str {
        self.alloc_str(&value)
    }

    /// Total bytes handed out by the arena's chunks
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Free every allocation at once
    ///
    /// Requires `&mut self`, so no borrowed value can outlive the reset.
    pub fn reset(&mut self) {
        self.bump.reset();
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

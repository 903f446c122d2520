// SPDX-License-Identifier: MPL-2.0

//! Raw access to the two memory-mapped register windows of a controller.

use core::ptr::NonNull;

use cfg_if::cfg_if;
use volatile::VolatilePtr;

/// Distributor register offsets, in bytes from the distributor window base.
pub(crate) mod dist {
    /// Distributor control register.
    pub const CTRL: usize = 0x000;
    /// Controller type register; bits 4..0 encode the supported line count.
    pub const CTR: usize = 0x004;
    /// Enable-set registers, 1 bit per line.
    pub const ENABLE_SET: usize = 0x100;
    /// Enable-clear registers, 1 bit per line.
    pub const ENABLE_CLEAR: usize = 0x180;
    /// Pending-set registers, 1 bit per line.
    pub const PENDING_SET: usize = 0x200;
    /// Pending-clear registers, 1 bit per line.
    pub const PENDING_CLEAR: usize = 0x280;
    /// Priority registers, 1 byte per line.
    pub const PRI: usize = 0x400;
    /// Target-CPU registers, 1 byte per line.
    pub const TARGET: usize = 0x800;
    /// Configuration registers, 2 bits per line.
    pub const CONFIG: usize = 0xC00;
    /// Software-generated interrupt trigger register.
    pub const SOFTINT: usize = 0xF00;
}

/// CPU interface register offsets, in bytes from the CPU interface base.
pub(crate) mod cpu {
    /// CPU interface control register.
    pub const CTRL: usize = 0x00;
    /// Priority mask register.
    pub const PRIMASK: usize = 0x04;
    /// Interrupt acknowledge register; the pending line id sits in bits 9..0.
    pub const INTACK: usize = 0x0C;
    /// End-of-interrupt register.
    pub const EOI: usize = 0x10;
}

/// Byte length of a distributor register window.
pub(crate) const DIST_WINDOW_LEN: usize = 0x1000;

/// Byte length of a CPU interface register window.
pub(crate) const CPU_WINDOW_LEN: usize = 0x100;

/// One memory-mapped register window, owned exclusively by its controller.
///
/// Offsets are byte offsets as given in the hardware manual. Accesses are
/// volatile and word-sized; the window itself does no locking, so callers
/// serialize read-modify-write sequences with the chip lock.
pub(crate) struct RegisterWindow {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is exclusively owned by one controller, and accesses to
// shared registers are serialized by the chip lock.
unsafe impl Send for RegisterWindow {}

impl RegisterWindow {
    /// # Safety
    ///
    /// `base` must point to a live mapping of at least `len` bytes of
    /// controller registers, and no other code may access that mapping.
    pub(crate) unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self { base, len }
    }

    fn at(&self, offset: usize) -> NonNull<u32> {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.len);
        // SAFETY: `offset` lies within the window the constructor vouched
        // for.
        unsafe { self.base.cast::<u8>().add(offset).cast() }
    }

    pub(crate) fn read(&self, offset: usize) -> u32 {
        // SAFETY: `at()` returns a valid register address inside the window.
        unsafe { VolatilePtr::new(self.at(offset)) }.read()
    }

    pub(crate) fn write(&self, offset: usize, value: u32) {
        // SAFETY: `at()` returns a valid register address inside the window.
        unsafe { VolatilePtr::new(self.at(offset)) }.write(value);
    }
}

cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        /// Completion barrier: the preceding register writes take effect
        /// before anything the caller does next.
        pub(crate) fn mb() {
            // SAFETY: a data synchronization barrier only orders accesses.
            unsafe { core::arch::asm!("dsb sy", options(nostack, preserves_flags)) };
        }
    } else {
        pub(crate) fn mb() {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}

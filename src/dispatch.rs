// SPDX-License-Identifier: MPL-2.0

//! Seams to the two external collaborators: the generic interrupt dispatch
//! framework and the platform's power-aware line hooks.

use bitflags::bitflags;

use crate::controller::Trigger;

/// The generic interrupt dispatch framework.
///
/// The framework owns the global line-number namespace and invokes the chip
/// operations in response to raised lines. The driver calls back into it to
/// publish freshly initialized lines, to switch a line over to edge
/// handling, and to deliver (or reject) cascaded interrupts.
///
/// All callbacks are invoked outside the chip lock.
pub trait IrqDispatch: Sync {
    /// Publishes a freshly initialized line. Level handling is the default;
    /// the driver may later switch the line to edge handling.
    fn register_line(&self, irq: u32);

    /// Switches the dispatch handling of `irq` to edge semantics.
    fn set_edge_handling(&self, irq: u32);

    /// Returns whether the framework holds a live descriptor for `irq`.
    fn has_descriptor(&self, irq: u32) -> bool;

    /// Delivers a cascaded interrupt to generic handling.
    fn handle_irq(&self, irq: u32);

    /// Takes delivery of a malformed interrupt that must not reach generic
    /// handling.
    fn handle_bad_irq(&self, irq: u32);
}

/// Observer for platform hooks that track per-line state changes, e.g. a
/// power manager mirroring mask state into an always-on wakeup block.
///
/// Every method defaults to a no-op. The chip invokes the hooks outside the
/// chip lock, after the corresponding register sequence has completed.
pub trait PlatformHooks: Sync {
    /// `irq` has been masked (`enabled == false`) or unmasked.
    fn line_enabled(&self, irq: u32, enabled: bool) {
        let _ = (irq, enabled);
    }

    /// The trigger configuration of `irq` changed.
    fn trigger_changed(&self, irq: u32, trigger: Trigger) {
        let _ = (irq, trigger);
    }

    /// The wake-source configuration of `irq` changed.
    fn wake_changed(&self, irq: u32, on: bool) {
        let _ = (irq, on);
    }
}

/// A [`PlatformHooks`] implementation that ignores every notification.
pub struct NoPlatformHooks;

impl PlatformHooks for NoPlatformHooks {}

bitflags! {
    /// Optional capabilities of a registered controller.
    ///
    /// Platforms differ in whether power management and multi-processor
    /// routing are wired up; each controller declares what it supports at
    /// registration instead of the crate hard-coding one platform.
    pub struct Capabilities: u8 {
        /// Shared lines may be configured as wake sources.
        const WAKE = 1 << 0;
        /// Shared lines may be routed to a chosen CPU.
        const AFFINITY = 1 << 1;
        /// The controller's combined output may cascade into a primary
        /// controller.
        const CASCADE = 1 << 2;
    }
}

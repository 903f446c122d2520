// SPDX-License-Identifier: MPL-2.0

//! The chip layer: global-line entry points over all registered controllers.
//!
//! One spin lock serializes every read-modify-write register sequence
//! across all controllers and all cores; hold times are bounded by a
//! handful of register accesses. Callbacks into the external collaborators
//! run outside the lock.

use core::ptr::NonNull;

use log::{info, warn};
use spin::{Mutex, Once};

use crate::{
    controller::{Gic, LineClass, Trigger, MAX_LINES},
    dispatch::{Capabilities, IrqDispatch, PlatformHooks},
    regs::{RegisterWindow, CPU_WINDOW_LEN, DIST_WINDOW_LEN},
    Error, Result,
};

/// Compile-time maximum number of controllers: one primary plus the single
/// cascade hop this driver supports.
pub const MAX_CONTROLLERS: usize = 2;

/// Upper bound on the global line ids the driver hands to the dispatch
/// framework.
pub(crate) const MAX_GLOBAL_LINES: u32 = (MAX_CONTROLLERS as u32) * 1024;

/// Acknowledge value reporting that no interrupt is pending.
const SPURIOUS: u32 = 1023;

/// The [`GicChip`] singleton.
pub static GIC_CHIP: Once<GicChip> = Once::new();

/// Initializes the global chip with its two external collaborators.
///
/// Call once at platform bring-up, then register controllers through the
/// returned chip (or [`GIC_CHIP`]).
pub fn init(
    dispatch: &'static dyn IrqDispatch,
    hooks: &'static dyn PlatformHooks,
) -> &'static GicChip {
    GIC_CHIP.call_once(|| GicChip::new(dispatch, hooks))
}

struct CascadeWire {
    primary_irq: u32,
    gic_nr: usize,
}

struct Controllers {
    gics: [Option<Gic>; MAX_CONTROLLERS],
    cascades: [Option<CascadeWire>; MAX_CONTROLLERS],
}

impl Controllers {
    /// Resolves a global line to its owning controller and local line.
    fn resolve(&self, irq: u32) -> Result<(usize, u32)> {
        for (nr, gic) in self.gics.iter().enumerate() {
            if let Some(gic) = gic {
                if let Some(local) = gic.local_line(irq) {
                    return Ok((nr, local));
                }
            }
        }
        Err(Error::NotFound)
    }

    fn gic(&self, nr: usize) -> &Gic {
        self.gics[nr].as_ref().expect("controller not registered")
    }

    fn gic_mut(&mut self, nr: usize) -> &mut Gic {
        self.gics[nr].as_mut().expect("controller not registered")
    }
}

/// The driver core for a set of cascaded interrupt controllers.
pub struct GicChip {
    controllers: Mutex<Controllers>,
    dispatch: &'static dyn IrqDispatch,
    hooks: &'static dyn PlatformHooks,
}

impl GicChip {
    /// Creates a chip with no controllers registered yet.
    pub fn new(dispatch: &'static dyn IrqDispatch, hooks: &'static dyn PlatformHooks) -> Self {
        Self {
            controllers: Mutex::new(Controllers {
                gics: core::array::from_fn(|_| None),
                cascades: core::array::from_fn(|_| None),
            }),
            dispatch,
            hooks,
        }
    }

    /// Registers controller `gic_nr` and brings it up on the boot CPU.
    ///
    /// Global lines starting at `irq_start` (which must be positive) map
    /// onto the controller's lines; every probed line is published to the
    /// dispatch framework with level handling as the default.
    ///
    /// # Safety
    ///
    /// `dist_base` and `cpu_base` must point to live, exclusively-owned
    /// mappings of the controller's distributor and CPU interface register
    /// windows.
    ///
    /// # Panics
    ///
    /// Panics when `gic_nr` is out of range, already registered, or
    /// `boot_cpu` does not fit the byte-wide target fields; all are
    /// platform misconfigurations that cannot be recovered at runtime.
    pub unsafe fn register_controller(
        &self,
        gic_nr: usize,
        irq_start: u32,
        dist_base: NonNull<u32>,
        cpu_base: NonNull<u32>,
        caps: Capabilities,
        boot_cpu: u32,
    ) {
        assert!(gic_nr < MAX_CONTROLLERS, "controller id {gic_nr} out of range");
        assert!(irq_start > 0, "global line 0 is not assignable");
        assert!(boot_cpu < 8, "boot cpu {boot_cpu} beyond the target byte");

        // SAFETY: the caller vouches for both windows.
        let dist = unsafe { RegisterWindow::new(dist_base, DIST_WINDOW_LEN) };
        let cpu_intf = unsafe { RegisterWindow::new(cpu_base, CPU_WINDOW_LEN) };
        // SAFETY: likewise.
        let mut gic = unsafe { Gic::new(irq_start, dist, cpu_intf, caps) };

        // Bring-up happens before the controller becomes visible to other
        // cores, so the dispatch callbacks run without the chip lock held.
        gic.init_distributor(irq_start, boot_cpu, self.dispatch);
        gic.init_cpu_interface();

        info!(
            "[GIC]: controller {} up with {} lines, global lines {}..{}",
            gic_nr,
            gic.line_count(),
            irq_start,
            gic.global_offset() + gic.line_count(),
        );

        let mut controllers = self.controllers.lock();
        assert!(
            controllers.gics[gic_nr].is_none(),
            "controller {gic_nr} registered twice"
        );
        controllers.gics[gic_nr] = Some(gic);
    }

    /// Re-runs the banked CPU-interface bring-up of `gic_nr` on a newly
    /// started core.
    pub fn init_secondary(&self, gic_nr: usize) {
        assert!(gic_nr < MAX_CONTROLLERS, "controller id {gic_nr} out of range");
        self.controllers.lock().gic(gic_nr).init_cpu_interface();
    }

    /// Signals end-of-interrupt for `irq`.
    pub fn ack(&self, irq: u32) -> Result<()> {
        let controllers = self.controllers.lock();
        let (nr, local) = controllers.resolve(irq)?;
        controllers.gic(nr).ack_line(local);
        Ok(())
    }

    /// Masks `irq` at its distributor. Masking a masked line is a no-op.
    pub fn mask(&self, irq: u32) -> Result<()> {
        {
            let controllers = self.controllers.lock();
            let (nr, local) = controllers.resolve(irq)?;
            controllers.gic(nr).mask_line(local);
        }
        self.hooks.line_enabled(irq, false);
        Ok(())
    }

    /// Unmasks `irq` at its distributor. Unmasking an unmasked line is a
    /// no-op.
    pub fn unmask(&self, irq: u32) -> Result<()> {
        {
            let controllers = self.controllers.lock();
            let (nr, local) = controllers.resolve(irq)?;
            controllers.gic(nr).unmask_line(local);
        }
        self.hooks.line_enabled(irq, true);
        Ok(())
    }

    /// Reconfigures the trigger of `irq`.
    ///
    /// Fails with [`Error::InvalidArgs`] on software-generated lines,
    /// leaving register state untouched. Shared lines switched to edge
    /// trigger also have their dispatch handling switched to edge
    /// semantics.
    pub fn set_trigger(&self, irq: u32, trigger: Trigger) -> Result<()> {
        let to_edge = {
            let controllers = self.controllers.lock();
            let (nr, local) = controllers.resolve(irq)?;
            controllers.gic(nr).set_trigger(local, trigger)?
        };
        // The dispatch framework takes its own locks.
        if to_edge {
            self.dispatch.set_edge_handling(irq);
        }
        self.hooks.trigger_changed(irq, trigger);
        Ok(())
    }

    /// Routes `irq` to the first CPU of `cpu_mask`.
    ///
    /// The hardware holds a single target byte per line, so the rest of the
    /// mask is deliberately ignored; callers relying on single-target
    /// routing keep their behavior.
    pub fn set_affinity(&self, irq: u32, cpu_mask: u32) -> Result<()> {
        if cpu_mask == 0 {
            return Err(Error::InvalidArgs);
        }
        if !self.dispatch.has_descriptor(irq) {
            return Err(Error::NotFound);
        }
        let target_cpu = cpu_mask.trailing_zeros();

        let controllers = self.controllers.lock();
        let (nr, local) = controllers.resolve(irq)?;
        controllers.gic(nr).set_target(local, target_cpu)
    }

    /// Configures `irq` as a wake source (or clears it). Succeeds as a
    /// no-op on controllers without wake support.
    ///
    /// # Panics
    ///
    /// Panics when `irq` is a banked line: banked lines cannot wake the
    /// system and asking is a platform programming error.
    pub fn set_wake(&self, irq: u32, on: bool) -> Result<()> {
        let applied = {
            let mut controllers = self.controllers.lock();
            let (nr, local) = controllers.resolve(irq)?;
            if controllers.gic(nr).capabilities().contains(Capabilities::WAKE) {
                controllers.gic_mut(nr).set_wake_line(local, on);
                true
            } else {
                false
            }
        };
        if applied {
            self.hooks.wake_changed(irq, on);
        }
        Ok(())
    }

    /// Raises software-generated interrupt `sgi` on the CPUs named by the
    /// byte-wide `targets` mask. Signals always go through controller 0.
    pub fn raise_softirq(&self, targets: u8, sgi: u32) {
        self.controllers.lock().gic(0).raise_softirq(targets, sgi);
    }

    /// Returns whether `irq` is pending.
    ///
    /// The caller must have local interrupts disabled and `irq` masked, or
    /// the answer races with delivery; querying an enabled line logs a
    /// warning but still reads the register.
    pub fn is_line_pending(&self, irq: u32) -> Result<bool> {
        let controllers = self.controllers.lock();
        let (nr, local) = controllers.resolve(irq)?;
        Ok(controllers.gic(nr).is_line_pending(local))
    }

    /// Clears the pending state of `irq`. Same preconditions as
    /// [`Self::is_line_pending`].
    pub fn clear_line_pending(&self, irq: u32) -> Result<()> {
        let controllers = self.controllers.lock();
        let (nr, local) = controllers.resolve(irq)?;
        controllers.gic(nr).clear_line_pending(local);
        Ok(())
    }

    /// Boot-time unmask of a banked private peripheral line on the calling
    /// core.
    pub fn enable_private_line(&self, irq: u32) -> Result<()> {
        {
            let controllers = self.controllers.lock();
            let (nr, local) = controllers.resolve(irq)?;
            if LineClass::of(local) != LineClass::PrivatePeripheral {
                return Err(Error::InvalidArgs);
            }
            controllers.gic(nr).unmask_line(local);
        }
        self.hooks.line_enabled(irq, true);
        Ok(())
    }

    /// Wires controller `gic_nr`'s combined output to line `primary_irq` of
    /// the primary controller.
    ///
    /// # Panics
    ///
    /// Panics when `gic_nr` is out of range, unregistered, or lacks the
    /// [`Capabilities::CASCADE`] capability; all are fatal platform
    /// misconfigurations.
    pub fn cascade_wire(&self, gic_nr: usize, primary_irq: u32) {
        assert!(gic_nr < MAX_CONTROLLERS, "controller id {gic_nr} out of range");
        let mut controllers = self.controllers.lock();
        assert!(
            controllers
                .gic(gic_nr)
                .capabilities()
                .contains(Capabilities::CASCADE),
            "controller {gic_nr} cannot cascade"
        );
        let slot = controllers
            .cascades
            .iter_mut()
            .find(|wire| wire.is_none())
            .expect("no free cascade slot");
        *slot = Some(CascadeWire { primary_irq, gic_nr });
    }

    /// Handles a fire of a cascaded secondary controller's output line.
    ///
    /// The primary line is acked before the secondary acknowledge read and
    /// unmasked after the secondary line has been dealt with. The bracket
    /// completes on every path; skipping the unmask would stall the primary
    /// line for good.
    pub fn handle_cascade(&self, primary_irq: u32) {
        let (primary_nr, primary_local, status, secondary_offset) = {
            let controllers = self.controllers.lock();
            let Some(wire) = controllers
                .cascades
                .iter()
                .flatten()
                .find(|wire| wire.primary_irq == primary_irq)
            else {
                warn!("[GIC]: cascade fire on unwired line {primary_irq}");
                return;
            };
            let secondary = controllers.gic(wire.gic_nr);

            let (primary_nr, primary_local) = match controllers.resolve(primary_irq) {
                Ok(resolved) => resolved,
                Err(_) => {
                    warn!("[GIC]: cascade wired to unknown line {primary_irq}");
                    return;
                }
            };
            controllers.gic(primary_nr).ack_line(primary_local);

            (
                primary_nr,
                primary_local,
                secondary.acknowledge(),
                secondary.global_offset(),
            )
        };

        if status != SPURIOUS {
            match cascade_target(secondary_offset, status) {
                Ok(irq) => self.dispatch.handle_irq(irq),
                Err(err) => {
                    warn!(
                        "[GIC]: {err:?}: acknowledge value {status} behind line {primary_irq}"
                    );
                    self.dispatch.handle_bad_irq(secondary_offset + status);
                }
            }
        }

        let controllers = self.controllers.lock();
        controllers.gic(primary_nr).unmask_line(primary_local);
    }

    /// Captures the enabled set of `gic_nr` and narrows it to its wake set.
    pub fn suspend(&self, gic_nr: usize) {
        assert!(gic_nr < MAX_CONTROLLERS, "controller id {gic_nr} out of range");
        self.controllers.lock().gic_mut(gic_nr).suspend();
    }

    /// Restores the enabled set captured by the matching [`Self::suspend`].
    pub fn resume(&self, gic_nr: usize) {
        assert!(gic_nr < MAX_CONTROLLERS, "controller id {gic_nr} out of range");
        self.controllers.lock().gic(gic_nr).resume();
    }

    /// Logs the lines of `gic_nr` that are enabled and pending, i.e. the
    /// wake sources that fired during sleep. Diagnostic only.
    pub fn log_resume_lines(&self, gic_nr: usize) {
        assert!(gic_nr < MAX_CONTROLLERS, "controller id {gic_nr} out of range");
        let (words, offset) = {
            let controllers = self.controllers.lock();
            let gic = controllers.gic(gic_nr);
            (gic.pending_enabled_words(), gic.global_offset())
        };
        for (word, mut pending) in words.into_iter().enumerate() {
            while pending != 0 {
                let bit = pending.trailing_zeros();
                pending &= pending - 1;
                warn!(
                    "[GIC]: line {} triggered during sleep",
                    offset + word as u32 * 32 + bit
                );
            }
        }
    }
}

/// Translates a cascade acknowledge value into a global line id.
fn cascade_target(secondary_offset: u32, status: u32) -> Result<u32> {
    let irq = secondary_offset + status;
    if !(32..=MAX_LINES).contains(&status) || irq >= MAX_GLOBAL_LINES {
        return Err(Error::MalformedInterrupt);
    }
    Ok(irq)
}

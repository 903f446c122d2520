// SPDX-License-Identifier: MPL-2.0

//! Per-controller state and register sequences.
//!
//! A [`Gic`] records one distributor/CPU-interface pair. The methods here
//! only encode the register sequences; the chip layer (see [`crate::chip`])
//! serializes them under the chip lock and talks to the external
//! collaborators.

use bit_field::BitField;
use log::warn;

use crate::{
    chip::MAX_GLOBAL_LINES,
    dispatch::{Capabilities, IrqDispatch},
    regs::{cpu, dist, mb, RegisterWindow},
    Error, Result,
};

/// The architecture exposes at most 1020 interrupt lines per controller.
pub const MAX_LINES: u32 = 1020;

/// Number of 32-line words needed to cover [`MAX_LINES`].
pub(crate) const LINE_WORDS: usize = 32;

/// Default priority written to every line at bring-up, one byte per line.
const DEFAULT_PRIORITY: u32 = 0xa0a0_a0a0;

/// Priority mask value admitting every priority the distributor hands out.
const PRIORITY_MASK_ALL: u32 = 0xf0;

/// Classes of interrupt lines, derived from the local line number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineClass {
    /// Lines 0-15: inter-core signals; trigger configuration is fixed.
    SoftwareGenerated,
    /// Lines 16-31: banked per core; neither affinity nor wake applies.
    PrivatePeripheral,
    /// Lines 32 and up: distributor-wide, with configurable trigger,
    /// affinity and wake.
    SharedPeripheral,
}

impl LineClass {
    /// Returns the class of the local line `local`.
    pub fn of(local: u32) -> Self {
        match local {
            0..=15 => Self::SoftwareGenerated,
            16..=31 => Self::PrivatePeripheral,
            _ => Self::SharedPeripheral,
        }
    }
}

/// Trigger configuration of a peripheral line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Level-sensitive, active high.
    LevelHigh,
    /// Edge-sensitive, rising edge.
    EdgeRising,
}

/// One distributor/CPU-interface pair.
pub(crate) struct Gic {
    global_offset: u32,
    dist: RegisterWindow,
    cpu_intf: RegisterWindow,
    line_count: u32,
    enabled_snapshot: [u32; LINE_WORDS],
    wake_snapshot: [u32; LINE_WORDS],
    caps: Capabilities,
}

fn line_bit(local: u32) -> u32 {
    1 << (local % 32)
}

fn enable_word(local: u32) -> usize {
    (local as usize / 32) * 4
}

impl Gic {
    /// # Safety
    ///
    /// The windows must map live controller registers and be exclusively
    /// owned by this instance.
    pub(crate) unsafe fn new(
        irq_start: u32,
        dist: RegisterWindow,
        cpu_intf: RegisterWindow,
        caps: Capabilities,
    ) -> Self {
        Self {
            // Global offsets are chosen so that local line 0 falls on a
            // 32-aligned global number.
            global_offset: (irq_start - 1) & !31,
            dist,
            cpu_intf,
            line_count: 0,
            enabled_snapshot: [0; LINE_WORDS],
            wake_snapshot: [0; LINE_WORDS],
            caps,
        }
    }

    pub(crate) fn global_offset(&self) -> u32 {
        self.global_offset
    }

    pub(crate) fn line_count(&self) -> u32 {
        self.line_count
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Returns the local line number of `irq` if this controller owns it.
    pub(crate) fn local_line(&self, irq: u32) -> Option<u32> {
        let local = irq.checked_sub(self.global_offset)?;
        (local < self.line_count).then_some(local)
    }

    /// Signals end-of-interrupt for `local` to the CPU interface; the
    /// controller will re-signal the line on its next pending edge or level.
    pub(crate) fn ack_line(&self, local: u32) {
        self.cpu_intf.write(cpu::EOI, local);
    }

    /// Masks `local` at the distributor. Idempotent.
    pub(crate) fn mask_line(&self, local: u32) {
        self.dist
            .write(dist::ENABLE_CLEAR + enable_word(local), line_bit(local));
    }

    /// Unmasks `local` at the distributor. Idempotent.
    pub(crate) fn unmask_line(&self, local: u32) {
        self.dist
            .write(dist::ENABLE_SET + enable_word(local), line_bit(local));
    }

    /// Reconfigures the trigger of `local`.
    ///
    /// The line is disabled around the configuration write when it is
    /// currently enabled, as the architecture requires. Returns whether the
    /// caller must switch the line's dispatch handling over to edge
    /// semantics.
    pub(crate) fn set_trigger(&self, local: u32, trigger: Trigger) -> Result<bool> {
        // The trigger configuration of software-generated lines is fixed.
        if LineClass::of(local) == LineClass::SoftwareGenerated {
            return Err(Error::InvalidArgs);
        }

        let conf_offset = dist::CONFIG + (local as usize / 16) * 4;
        let conf_mask = 0x2u32 << ((local % 16) * 2);
        let enable_bit = line_bit(local);

        let mut conf = self.dist.read(conf_offset);
        match trigger {
            Trigger::LevelHigh => conf &= !conf_mask,
            Trigger::EdgeRising => conf |= conf_mask,
        }

        let enabled = self.dist.read(dist::ENABLE_SET + enable_word(local)) & enable_bit != 0;
        if enabled {
            self.dist
                .write(dist::ENABLE_CLEAR + enable_word(local), enable_bit);
        }

        self.dist.write(conf_offset, conf);

        if enabled {
            self.dist
                .write(dist::ENABLE_SET + enable_word(local), enable_bit);
        }

        Ok(trigger == Trigger::EdgeRising && LineClass::of(local) == LineClass::SharedPeripheral)
    }

    /// Routes `local` to `target_cpu` and to that CPU only.
    pub(crate) fn set_target(&self, local: u32, target_cpu: u32) -> Result<()> {
        if !self.caps.contains(Capabilities::AFFINITY) {
            return Err(Error::InvalidArgs);
        }
        // Banked lines always target their own core.
        if LineClass::of(local) != LineClass::SharedPeripheral {
            return Err(Error::InvalidArgs);
        }
        // The target field holds one bit per CPU in a byte; a larger CPU
        // number would spill into a neighboring line's byte.
        if target_cpu >= 8 {
            return Err(Error::InvalidArgs);
        }

        let offset = dist::TARGET + (local as usize & !3);
        let shift = (local % 4) * 8;
        let mut targets = self.dist.read(offset);
        targets &= !(0xff << shift);
        targets |= 1 << (target_cpu + shift);
        self.dist.write(offset, targets);
        Ok(())
    }

    /// Marks `local` as a wake source (or clears the mark).
    ///
    /// Banked lines cannot wake the system; asking for it is a programming
    /// error on the platform side, not a recoverable condition.
    pub(crate) fn set_wake_line(&mut self, local: u32, on: bool) {
        assert!(
            LineClass::of(local) == LineClass::SharedPeripheral,
            "banked line {local} cannot be a wake source"
        );
        let word = local as usize / 32;
        if on {
            self.wake_snapshot[word] |= line_bit(local);
        } else {
            self.wake_snapshot[word] &= !line_bit(local);
        }
    }

    /// Reads the pending bit of `local`.
    ///
    /// Warns when the line is still enabled: the answer then races with
    /// delivery and the caller's quiescence assumption does not hold.
    pub(crate) fn is_line_pending(&self, local: u32) -> bool {
        self.warn_if_enabled(local);
        self.dist.read(dist::PENDING_SET + enable_word(local)) & line_bit(local) != 0
    }

    /// Clears the pending bit of `local`. Same caveat as
    /// [`Self::is_line_pending`].
    pub(crate) fn clear_line_pending(&self, local: u32) {
        self.warn_if_enabled(local);
        self.dist
            .write(dist::PENDING_CLEAR + enable_word(local), line_bit(local));
    }

    fn warn_if_enabled(&self, local: u32) {
        let enabled = self.dist.read(dist::ENABLE_SET + enable_word(local));
        if enabled & line_bit(local) != 0 {
            warn!(
                "[GIC]: pending access to line {} while it is enabled",
                self.global_offset + local
            );
        }
    }

    /// Reads the interrupt acknowledge register, returning the pending local
    /// line number (1023 when nothing is pending).
    pub(crate) fn acknowledge(&self) -> u32 {
        self.cpu_intf.read(cpu::INTACK).get_bits(0..10)
    }

    /// Raises software-generated interrupt `sgi` on the CPUs named by the
    /// byte-wide `targets` mask.
    pub(crate) fn raise_softirq(&self, targets: u8, sgi: u32) {
        debug_assert!(LineClass::of(sgi) == LineClass::SoftwareGenerated);
        self.dist.write(dist::SOFTINT, (targets as u32) << 16 | sgi);
        // Wait for the trigger write to complete before returning.
        mb();
    }

    /// Brings up the distributor. Runs once per controller, before any line
    /// operation and before other cores can observe the controller.
    pub(crate) fn init_distributor(
        &mut self,
        irq_start: u32,
        boot_cpu: u32,
        dispatch: &dyn IrqDispatch,
    ) {
        // One target byte per line, replicated across the 4-line word.
        let mut targets = 1u32 << boot_cpu;
        targets |= targets << 8;
        targets |= targets << 16;

        self.dist.write(dist::CTRL, 0);

        let lines = (self.dist.read(dist::CTR).get_bits(0..5) + 1) * 32;
        self.line_count = lines.min(MAX_LINES);

        // Shared lines: level triggered, active low.
        for line in (32..self.line_count).step_by(16) {
            self.dist.write(dist::CONFIG + (line as usize / 16) * 4, 0);
        }
        // Route all shared lines to the boot CPU only.
        for line in (32..self.line_count).step_by(4) {
            self.dist.write(dist::TARGET + line as usize, targets);
        }
        for line in (32..self.line_count).step_by(4) {
            self.dist.write(dist::PRI + line as usize, DEFAULT_PRIORITY);
        }
        // Disable all shared lines. The words below 32 are banked and left
        // to the per-CPU bring-up.
        for line in (32..self.line_count).step_by(32) {
            self.dist.write(dist::ENABLE_CLEAR + enable_word(line), !0);
        }

        let mut limit = self.global_offset + self.line_count;
        if limit > MAX_GLOBAL_LINES {
            warn!("[GIC]: capping published lines at {}", MAX_GLOBAL_LINES);
            limit = MAX_GLOBAL_LINES;
        }
        for irq in irq_start..limit {
            dispatch.register_line(irq);
        }

        self.dist.write(dist::CTRL, 1);
        mb();
    }

    /// Brings up the CPU interface on the calling core.
    pub(crate) fn init_cpu_interface(&self) {
        // Banked enable words: disable the private peripheral lines, make
        // sure all software-generated lines are enabled.
        self.dist.write(dist::ENABLE_CLEAR, 0xffff_0000);
        self.dist.write(dist::ENABLE_SET, 0x0000_ffff);
        for line in (0..32usize).step_by(4) {
            self.dist.write(dist::PRI + line, DEFAULT_PRIORITY);
        }

        self.cpu_intf.write(cpu::PRIMASK, PRIORITY_MASK_ALL);
        self.cpu_intf.write(cpu::CTRL, 1);
        mb();
    }

    /// Narrows the enabled set to the wake set, capturing the enabled set
    /// for the matching [`Self::resume`].
    pub(crate) fn suspend(&mut self) {
        for word in 0..self.word_count() {
            let offset = word * 4;
            self.enabled_snapshot[word] = self.dist.read(dist::ENABLE_SET + offset);
            self.dist.write(dist::ENABLE_CLEAR + offset, !0);
            // Re-enable the enabled wake lines; a wake line that was masked
            // before suspend stays masked.
            self.dist.write(
                dist::ENABLE_SET + offset,
                self.enabled_snapshot[word] & self.wake_snapshot[word],
            );
        }
        mb();
    }

    /// Restores the enabled set captured by the matching [`Self::suspend`].
    pub(crate) fn resume(&self) {
        for word in 0..self.word_count() {
            let offset = word * 4;
            self.dist.write(dist::ENABLE_CLEAR + offset, !0);
            self.dist
                .write(dist::ENABLE_SET + offset, self.enabled_snapshot[word]);
        }
        mb();
    }

    /// Collects, word by word, the lines that are both enabled and pending.
    pub(crate) fn pending_enabled_words(&self) -> [u32; LINE_WORDS] {
        let mut words = [0; LINE_WORDS];
        for word in 0..self.word_count() {
            let offset = word * 4;
            let enabled = self.dist.read(dist::ENABLE_SET + offset);
            words[word] = self.dist.read(dist::PENDING_SET + offset) & enabled;
        }
        words
    }

    fn word_count(&self) -> usize {
        (self.line_count as usize).div_ceil(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_classes() {
        assert_eq!(LineClass::of(0), LineClass::SoftwareGenerated);
        assert_eq!(LineClass::of(15), LineClass::SoftwareGenerated);
        assert_eq!(LineClass::of(16), LineClass::PrivatePeripheral);
        assert_eq!(LineClass::of(31), LineClass::PrivatePeripheral);
        assert_eq!(LineClass::of(32), LineClass::SharedPeripheral);
        assert_eq!(LineClass::of(1019), LineClass::SharedPeripheral);
    }

    #[test]
    fn bit_and_word_helpers() {
        assert_eq!(line_bit(0), 1);
        assert_eq!(line_bit(50), 1 << 18);
        assert_eq!(enable_word(31), 0);
        assert_eq!(enable_word(32), 4);
        assert_eq!(enable_word(95), 8);
    }
}

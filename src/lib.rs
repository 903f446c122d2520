// SPDX-License-Identifier: MPL-2.0

//! Driver core for the two-tier ARM Generic Interrupt Controller (GICv2).
//!
//! The controller consists of two hardware blocks: a shared **distributor**
//! that routes peripheral interrupt lines to CPUs, and one **CPU interface**
//! per core that delivers routed and locally-generated interrupts to its
//! core. Local lines 0-15 are software-generated inter-core signals, 16-31
//! are private peripheral lines banked per core, and everything from 32 up
//! is a shared peripheral line with configurable trigger, affinity and wake
//! behavior.
//!
//! This crate models the register-level state machine of both blocks:
//! per-line mask/unmask/ack/trigger/affinity/wake operations, controller and
//! per-core bring-up, suspend/resume, inter-core software interrupts, and
//! one level of controller cascading. The generic dispatch framework that
//! owns the global interrupt-number namespace, and the platform's
//! power-management hooks, stay outside the crate behind the [`IrqDispatch`]
//! and [`PlatformHooks`] seams.
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

mod chip;
mod controller;
mod dispatch;
mod error;
mod regs;

pub use self::{
    chip::{init, GicChip, GIC_CHIP, MAX_CONTROLLERS},
    controller::{LineClass, Trigger, MAX_LINES},
    dispatch::{Capabilities, IrqDispatch, NoPlatformHooks, PlatformHooks},
    error::{Error, Result},
};

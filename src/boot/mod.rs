//! One-shot clock-tree bring-up, run immediately after reset.
//!
//! The sequence takes the chip from the 16 MHz internal RC oscillator to a
//! fully programmed clock tree. Step order is a hardware contract: each step
//! relies on the state established by the previous one, and the ME unit only
//! re-derives the effective clock set from the mode table on a committed
//! transition, which is why the sequence ends with a second DRUN switch.

use crate::bus::{self, BridgeBus, ClockGenBus, FlashBus, ModeEntryBus};
use crate::cgm;
use crate::config::Config;
use crate::me::{self, mc, RunMode, TransitionError};

/// AIPS master protection word: all masters trusted, any operation allowed.
const MPROT_ALL_MASTERS: u32 = 0x7777_7777;

/// SSCM fault policy: bus-error on peripheral and register invalid accesses
/// (PAE | RAE), the strictest setting.
const FAULT_POLICY_STRICT: u16 = 0x0003;

/// Draft DRUN word for the oscillator switch-over check: system clock stays
/// on the IRC while the external oscillator, flash and regulator run
/// concurrently.
const DRAFT_DRUN_MC: u32 = mc::SYSCLK_IRC | mc::IRCON | mc::XOSC0ON | mc::FLAON_NORMAL | mc::MVRON;

/// CFLASH wait-state and prefetch timing (PFCR0 APC/WWSC/RWSC fields).
///
/// Values are a function of the maximum target clock frequency and must be
/// programmed before that frequency is reached.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashTiming {
    /// Address pipelining control.
    pub apc: u8,
    /// Write wait-state control.
    pub wwsc: u8,
    /// Read wait-state control.
    pub rwsc: u8,
}

impl FlashTiming {
    pub const fn new(apc: u8, wwsc: u8, rwsc: u8) -> Self {
        Self { apc, wwsc, rwsc }
    }

    pub(crate) const fn word(&self) -> u32 {
        ((self.apc as u32) << 13) | ((self.wwsc as u32) << 11) | ((self.rwsc as u32) << 8)
    }
}

impl Default for FlashTiming {
    /// Calculated for a maximum clock of 120 MHz.
    fn default() -> Self {
        Self::new(3, 3, 3)
    }
}

/// Fatal bring-up failure.
///
/// Bring-up establishes the clock everything else depends on, so there is no
/// recovery path: the caller must halt (or, in a hosted test, observe the
/// error) rather than continue in an unknown clock state.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError {
    /// A bring-up mode transition was rejected by the ME unit.
    ModeSwitch(TransitionError),
    /// The unit did not report the expected mode after the draft switch,
    /// which points at a mis-wired handshake.
    ModeMismatch { expected: RunMode, found: u32 },
}

impl From<TransitionError> for BringUpError {
    fn from(err: TransitionError) -> Self {
        BringUpError::ModeSwitch(err)
    }
}

/// Runs the bring-up sequence over the given register bus.
pub(crate) fn bring_up<B>(bus: &mut B, config: &Config) -> Result<(), BringUpError>
where
    B: ModeEntryBus + ClockGenBus + BridgeBus + FlashBus,
{
    // 1. Nothing is meaningful without a stable clock reference; this runs
    //    once at boot before anything depends on timing, so wait forever.
    while bus.read_gs() & me::GS_IRCOSC_STABLE == 0 {}

    if config.no_init {
        return Ok(());
    }

    trace!("boot: IRC stable, programming bus protections");

    // 2. Strictest fault handling for invalid accesses, then the bridges
    //    opened up so the remaining configuration can reach every block.
    bus.write_fault_policy(FAULT_POLICY_STRICT);
    bus.write_master_protection(MPROT_ALL_MASTERS);
    for index in 0..bus::PACR_COUNT {
        bus.write_pacr(index, 0);
    }
    for index in 0..bus::OPACR_COUNT {
        bus.write_opacr(index, 0);
    }

    // 3.
    if config.cgm.osc_bypass {
        bus.set_osc_bypass();
    }

    // 4. Dividers and selectors; inert until a mode switch commits them.
    cgm::apply_dividers(bus, &config.cgm);

    // 5. Switch to DRUN with the external oscillator running to check its
    //    functionality before any PLL depends on it.
    bus.write_mode_config(RunMode::Drun, DRAFT_DRUN_MC);
    me::switch_mode(bus, RunMode::Drun)?;

    // 6.
    let found = (bus.read_gs() >> me::GS_CURRENT_MODE_SHIFT) & 0xF;
    if found != RunMode::Drun as u32 {
        error!("boot: expected DRUN after switch, ME reports {}", found);
        return Err(BringUpError::ModeMismatch {
            expected: RunMode::Drun,
            found,
        });
    }

    // 7.
    cgm::apply_plls(bus, &config.cgm);

    // 8. Full mode table: enabled modes, per-mode machine configuration,
    //    peripheral run and low-power control words.
    let table = &config.modes;
    bus.write_mer(table.enabled_modes);
    for mode in RunMode::ALL {
        bus.write_mode_config(mode, table.word(mode));
    }
    for index in 0..bus::PERIPH_CTL_COUNT {
        bus.write_run_pc(index, table.run_pc[index]);
    }
    for index in 0..bus::PERIPH_CTL_COUNT {
        bus.write_lp_pc(index, table.lp_pc[index]);
    }

    // 9. Wait states must match the target maximum frequency before that
    //    frequency is actually reached.
    bus.write_pfcr0(config.flash.word());

    // 10. Re-enter DRUN so the unit latches the now-complete configuration.
    me::switch_mode(bus, RunMode::Drun)?;

    debug!("boot: clock tree bring-up complete");
    Ok(())
}

/// SPC56EL early initialization.
///
/// Must be invoked exactly once, immediately after system reset, before
/// interrupts or any other subsystem is active. With `Config::no_init` set,
/// only the oscillator-stability wait is performed.
///
/// # Safety
///
/// Reprograms the chip-wide clock, bus-protection and flash-timing registers;
/// nothing else may be using them concurrently.
pub unsafe fn early_init(config: &Config) -> Result<(), BringUpError> {
    bring_up(&mut { bus::SOC }, config)
}

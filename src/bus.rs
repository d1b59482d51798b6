//! Register ports for the clock and mode-entry register blocks.
//!
//! Every block this crate touches is reached through a small port trait with
//! register-granularity accessors: [`ModeEntryBus`] (ME), [`ClockGenBus`]
//! (CGM), [`BridgeBus`] (AIPS + SSCM) and [`FlashBus`] (CFLASH). Production
//! code uses [`SOC`], which binds all four ports to the physical register
//! bases; tests bind them to an in-memory register file with scripted status
//! responses.
//!
//! Offsets and bit positions below follow the SPC56EL reference manual and
//! must be re-checked for the exact chip variant in use.

use crate::me::RunMode;

/// Number of AIPS PACR registers (on-platform peripherals 0..31).
pub const PACR_COUNT: usize = 4;
/// Number of AIPS OPACR registers (off-platform peripherals 0..95).
pub const OPACR_COUNT: usize = 12;
/// Number of ME_RUNPC / ME_LPPC peripheral-control registers.
pub const PERIPH_CTL_COUNT: usize = 8;
/// Number of ME_PCTL peripheral clock-control slots.
pub const PCTL_COUNT: usize = 144;

/// ME (mode entry) register port.
pub trait ModeEntryBus {
    /// Read ME_GS (global status).
    fn read_gs(&mut self) -> u32;
    /// Read ME_IS (interrupt status).
    fn read_is(&mut self) -> u32;
    /// Write ME_IS; writing 1 clears the corresponding flag.
    fn write_is(&mut self, value: u32);
    /// Write ME_MCTL (mode control, target mode + key).
    fn write_mctl(&mut self, value: u32);
    /// Write ME_MER (enabled-modes mask).
    fn write_mer(&mut self, value: u32);
    /// Write the machine-configuration word for one run mode.
    fn write_mode_config(&mut self, mode: RunMode, value: u32);
    /// Write ME_RUNPC\[index\], `index < PERIPH_CTL_COUNT`.
    fn write_run_pc(&mut self, index: usize, value: u32);
    /// Write ME_LPPC\[index\], `index < PERIPH_CTL_COUNT`.
    fn write_lp_pc(&mut self, index: usize, value: u32);
    /// Write the ME_PCTL byte for one peripheral slot, `slot < PCTL_COUNT`.
    fn write_pctl(&mut self, slot: usize, value: u8);
}

/// CGM (clock generation module) register port.
pub trait ClockGenBus {
    /// Set CGM_OSC_CTL.OSCBYP (board uses an active oscillator, not a crystal).
    fn set_osc_bypass(&mut self);
    /// Write CGM_SC_DC0 (system clock divider configuration).
    fn write_sc_dc0(&mut self, value: u32);
    /// Write the source-selector word for auxiliary clock `group`.
    fn write_aux_sc(&mut self, group: usize, value: u32);
    /// Write the divider word for auxiliary clock `group`.
    fn write_aux_dc(&mut self, group: usize, value: u32);
    /// Write CGM_FMPLL\[pll\].CR (dividers and multiplier).
    fn write_pll_cr(&mut self, pll: usize, value: u32);
    /// Write CGM_FMPLL\[pll\].MR (modulation register).
    fn write_pll_mr(&mut self, pll: usize, value: u32);
}

/// AIPS bridge protection + SSCM fault policy register port.
pub trait BridgeBus {
    /// Write SSCM_ERROR (invalid-access fault policy).
    fn write_fault_policy(&mut self, value: u16);
    /// Write AIPS_MPROT (master privilege/protection word).
    fn write_master_protection(&mut self, value: u32);
    /// Write AIPS_PACR\[index\], `index < PACR_COUNT`.
    fn write_pacr(&mut self, index: usize, value: u32);
    /// Write AIPS_OPACR\[index\], `index < OPACR_COUNT`.
    fn write_opacr(&mut self, index: usize, value: u32);
}

/// CFLASH controller register port.
pub trait FlashBus {
    /// Write CFLASH_PFCR0 (prefetch/wait-state configuration).
    fn write_pfcr0(&mut self, value: u32);
}

// Physical register bases (peripheral bridge B).
const ME_BASE: usize = 0xC3FD_C000;
const CGM_BASE: usize = 0xC3FE_0000;
const SSCM_BASE: usize = 0xC3FD_8000;
const AIPS_BASE: usize = 0xC3F9_0000;
const CFLASH_BASE: usize = 0xC3F8_8000;

// ME register offsets. Per-mode MC words sit at 0x20 + 4 * mode encoding.
const ME_GS: usize = 0x00;
const ME_MCTL: usize = 0x04;
const ME_MER: usize = 0x08;
const ME_IS: usize = 0x0C;
const ME_MC: usize = 0x20;
const ME_RUNPC: usize = 0x80;
const ME_LPPC: usize = 0xA0;
const ME_PCTL: usize = 0xC0;

// CGM register offsets. Auxiliary groups are 8 bytes apart, FMPLLs 0x20.
const CGM_OSC_CTL: usize = 0x00;
const CGM_SC_DC0: usize = 0x1C;
const CGM_AC_SC: usize = 0x20;
const CGM_AC_DC: usize = 0x24;
const CGM_FMPLL_CR: usize = 0x100;
const CGM_FMPLL_MR: usize = 0x104;
const CGM_FMPLL_STRIDE: usize = 0x20;

const OSC_CTL_OSCBYP: u32 = 1 << 31;

const SSCM_ERROR: usize = 0x06;
const AIPS_MPROT: usize = 0x00;
const AIPS_PACR: usize = 0x20;
const AIPS_OPACR: usize = 0x40;
const CFLASH_PFCR0: usize = 0x00;

/// All register blocks of the production chip, bound at their physical bases.
///
/// Every access is a volatile read or write of a memory-mapped register, so
/// this handle is only meaningful on the target chip.
#[derive(Clone, Copy)]
pub struct Soc {
    _private: (),
}

/// The production register bus.
pub const SOC: Soc = Soc { _private: () };

fn reg32(base: usize, offset: usize) -> *mut u32 {
    (base + offset) as *mut u32
}

fn read32(base: usize, offset: usize) -> u32 {
    unsafe { reg32(base, offset).read_volatile() }
}

fn write32(base: usize, offset: usize, value: u32) {
    unsafe { reg32(base, offset).write_volatile(value) }
}

impl ModeEntryBus for Soc {
    fn read_gs(&mut self) -> u32 {
        read32(ME_BASE, ME_GS)
    }

    fn read_is(&mut self) -> u32 {
        read32(ME_BASE, ME_IS)
    }

    fn write_is(&mut self, value: u32) {
        write32(ME_BASE, ME_IS, value);
    }

    fn write_mctl(&mut self, value: u32) {
        write32(ME_BASE, ME_MCTL, value);
    }

    fn write_mer(&mut self, value: u32) {
        write32(ME_BASE, ME_MER, value);
    }

    fn write_mode_config(&mut self, mode: RunMode, value: u32) {
        write32(ME_BASE, ME_MC + 4 * mode as usize, value);
    }

    fn write_run_pc(&mut self, index: usize, value: u32) {
        debug_assert!(index < PERIPH_CTL_COUNT);
        write32(ME_BASE, ME_RUNPC + 4 * index, value);
    }

    fn write_lp_pc(&mut self, index: usize, value: u32) {
        debug_assert!(index < PERIPH_CTL_COUNT);
        write32(ME_BASE, ME_LPPC + 4 * index, value);
    }

    fn write_pctl(&mut self, slot: usize, value: u8) {
        debug_assert!(slot < PCTL_COUNT);
        unsafe { ((ME_BASE + ME_PCTL + slot) as *mut u8).write_volatile(value) }
    }
}

impl ClockGenBus for Soc {
    fn set_osc_bypass(&mut self) {
        let ctl = read32(CGM_BASE, CGM_OSC_CTL);
        write32(CGM_BASE, CGM_OSC_CTL, ctl | OSC_CTL_OSCBYP);
    }

    fn write_sc_dc0(&mut self, value: u32) {
        write32(CGM_BASE, CGM_SC_DC0, value);
    }

    fn write_aux_sc(&mut self, group: usize, value: u32) {
        write32(CGM_BASE, CGM_AC_SC + 8 * group, value);
    }

    fn write_aux_dc(&mut self, group: usize, value: u32) {
        write32(CGM_BASE, CGM_AC_DC + 8 * group, value);
    }

    fn write_pll_cr(&mut self, pll: usize, value: u32) {
        write32(CGM_BASE, CGM_FMPLL_CR + CGM_FMPLL_STRIDE * pll, value);
    }

    fn write_pll_mr(&mut self, pll: usize, value: u32) {
        write32(CGM_BASE, CGM_FMPLL_MR + CGM_FMPLL_STRIDE * pll, value);
    }
}

impl BridgeBus for Soc {
    fn write_fault_policy(&mut self, value: u16) {
        unsafe { ((SSCM_BASE + SSCM_ERROR) as *mut u16).write_volatile(value) }
    }

    fn write_master_protection(&mut self, value: u32) {
        write32(AIPS_BASE, AIPS_MPROT, value);
    }

    fn write_pacr(&mut self, index: usize, value: u32) {
        debug_assert!(index < PACR_COUNT);
        write32(AIPS_BASE, AIPS_PACR + 4 * index, value);
    }

    fn write_opacr(&mut self, index: usize, value: u32) {
        debug_assert!(index < OPACR_COUNT);
        write32(AIPS_BASE, AIPS_OPACR + 4 * index, value);
    }
}

impl FlashBus for Soc {
    fn write_pfcr0(&mut self, value: u32) {
        write32(CFLASH_BASE, CFLASH_PFCR0, value);
    }
}

#[cfg(test)]
pub(crate) mod sim {
    //! Simulated register file with scripted ME status responses.

    use std::collections::VecDeque;
    use std::vec::Vec;

    use super::{BridgeBus, ClockGenBus, FlashBus, ModeEntryBus};
    use crate::me::{self, RunMode};

    /// One logged register write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Event {
        IsWrite(u32),
        Mctl(u32),
        Mer(u32),
        ModeConfig(RunMode, u32),
        RunPc(usize, u32),
        LpPc(usize, u32),
        Pctl(usize, u8),
        OscBypass,
        ScDc0(u32),
        AuxSc(usize, u32),
        AuxDc(usize, u32),
        PllCr(usize, u32),
        PllMr(usize, u32),
        FaultPolicy(u16),
        MasterProtection(u32),
        Pacr(usize, u32),
        Opacr(usize, u32),
        Pfcr0(u32),
    }

    /// Simulated register bus implementing all four block ports.
    ///
    /// `is_script` supplies successive ME_IS read values; once exhausted, reads
    /// report a completed transition. When a read reports completion, the
    /// current-mode field of ME_GS follows the last MCTL target, like the real
    /// unit (disable with `commit_mode = false`).
    pub struct SimBus {
        pub gs: u32,
        pub gs_reads: usize,
        pub is_script: VecDeque<u32>,
        pub is_reads: usize,
        pub last_mctl: u32,
        pub commit_mode: bool,
        pub events: Vec<Event>,
    }

    impl SimBus {
        pub fn new() -> Self {
            Self {
                gs: me::GS_IRCOSC_STABLE | (RunMode::Drun as u32) << me::GS_CURRENT_MODE_SHIFT,
                gs_reads: 0,
                is_script: VecDeque::new(),
                is_reads: 0,
                last_mctl: 0,
                commit_mode: true,
                events: Vec::new(),
            }
        }

        pub fn with_is_script(script: &[u32]) -> Self {
            let mut sim = Self::new();
            sim.is_script = script.iter().copied().collect();
            sim
        }

        pub fn current_mode_bits(&self) -> u32 {
            (self.gs >> me::GS_CURRENT_MODE_SHIFT) & 0xF
        }

        pub fn set_current_mode(&mut self, mode: RunMode) {
            self.gs &= !(0xF << me::GS_CURRENT_MODE_SHIFT);
            self.gs |= (mode as u32) << me::GS_CURRENT_MODE_SHIFT;
        }

        pub fn set_sysclk_bits(&mut self, bits: u32) {
            self.gs &= !0xF;
            self.gs |= bits & 0xF;
        }

        /// MCTL writes, in order.
        pub fn mctl_writes(&self) -> Vec<u32> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Mctl(v) => Some(*v),
                    _ => None,
                })
                .collect()
        }

        /// Index of the first event matching `pred`.
        pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
            self.events.iter().position(pred)
        }
    }

    impl ModeEntryBus for SimBus {
        fn read_gs(&mut self) -> u32 {
            self.gs_reads += 1;
            self.gs
        }

        fn read_is(&mut self) -> u32 {
            self.is_reads += 1;
            let value = self.is_script.pop_front().unwrap_or(me::IS_MTC);
            if value & me::IS_MTC != 0 && self.commit_mode {
                let target = (self.last_mctl >> me::MCTL_TARGET_SHIFT) & 0xF;
                self.gs &= !(0xF << me::GS_CURRENT_MODE_SHIFT);
                self.gs |= target << me::GS_CURRENT_MODE_SHIFT;
            }
            value
        }

        fn write_is(&mut self, value: u32) {
            self.events.push(Event::IsWrite(value));
        }

        fn write_mctl(&mut self, value: u32) {
            self.last_mctl = value;
            self.events.push(Event::Mctl(value));
        }

        fn write_mer(&mut self, value: u32) {
            self.events.push(Event::Mer(value));
        }

        fn write_mode_config(&mut self, mode: RunMode, value: u32) {
            self.events.push(Event::ModeConfig(mode, value));
        }

        fn write_run_pc(&mut self, index: usize, value: u32) {
            self.events.push(Event::RunPc(index, value));
        }

        fn write_lp_pc(&mut self, index: usize, value: u32) {
            self.events.push(Event::LpPc(index, value));
        }

        fn write_pctl(&mut self, slot: usize, value: u8) {
            self.events.push(Event::Pctl(slot, value));
        }
    }

    impl ClockGenBus for SimBus {
        fn set_osc_bypass(&mut self) {
            self.events.push(Event::OscBypass);
        }

        fn write_sc_dc0(&mut self, value: u32) {
            self.events.push(Event::ScDc0(value));
        }

        fn write_aux_sc(&mut self, group: usize, value: u32) {
            self.events.push(Event::AuxSc(group, value));
        }

        fn write_aux_dc(&mut self, group: usize, value: u32) {
            self.events.push(Event::AuxDc(group, value));
        }

        fn write_pll_cr(&mut self, pll: usize, value: u32) {
            self.events.push(Event::PllCr(pll, value));
        }

        fn write_pll_mr(&mut self, pll: usize, value: u32) {
            self.events.push(Event::PllMr(pll, value));
        }
    }

    impl BridgeBus for SimBus {
        fn write_fault_policy(&mut self, value: u16) {
            self.events.push(Event::FaultPolicy(value));
        }

        fn write_master_protection(&mut self, value: u32) {
            self.events.push(Event::MasterProtection(value));
        }

        fn write_pacr(&mut self, index: usize, value: u32) {
            self.events.push(Event::Pacr(index, value));
        }

        fn write_opacr(&mut self, index: usize, value: u32) {
            self.events.push(Event::Opacr(index, value));
        }
    }

    impl FlashBus for SimBus {
        fn write_pfcr0(&mut self, value: u32) {
            self.events.push(Event::Pfcr0(value));
        }
    }
}

//! ME (mode entry): run-mode transitions, peripheral clock gating, and the
//! system clock query.
//!
//! The ME unit arbitrates run-mode switches. A switch is requested by writing
//! the target mode to ME_MCTL twice, first with the arm key and then with its
//! bitwise inverse; the unit commits the request only after seeing both words,
//! which rejects spurious single writes from a fault. Completion or error is
//! then reported through ME_IS. The unit resolves every request in bounded
//! real time, so the status poll carries no timeout.

use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::CriticalSection;

use crate::bus::{self, ModeEntryBus};
use crate::time::Hertz;

// ME_MCTL layout. The key pair is the anti-glitch handshake.
pub(crate) const MCTL_KEY: u32 = 0x5AF0;
pub(crate) const MCTL_KEY_INV: u32 = 0xA50F;
pub(crate) const MCTL_TARGET_SHIFT: u32 = 28;

// ME_IS flags, write-1-to-clear.
/// Mode transition complete.
pub(crate) const IS_MTC: u32 = 1 << 0;
/// Invalid mode / transition error.
pub(crate) const IS_IMODE: u32 = 1 << 2;

// ME_GS layout.
pub(crate) const GS_SYSCLK_MASK: u32 = 0xF;
pub(crate) const GS_IRCOSC_STABLE: u32 = 1 << 4;
pub(crate) const GS_CURRENT_MODE_SHIFT: u32 = 28;

/// Run modes of the ME unit, encoded as in ME_MCTL.TARGET_MODE.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RunMode {
    /// Fallback mode entered on critical hardware faults.
    Safe = 2,
    /// Debug/default run mode, current after reset and during bring-up.
    Drun = 3,
    /// Normal operation.
    Run0 = 4,
    Run1 = 5,
    Run2 = 6,
    Run3 = 7,
    /// Core halted, peripherals clocked per ME_LPPC.
    Halt0 = 8,
    /// Core and most clocks stopped.
    Stop0 = 10,
}

impl RunMode {
    /// All software-reachable run modes, in encoding order.
    pub const ALL: [RunMode; 8] = [
        RunMode::Safe,
        RunMode::Drun,
        RunMode::Run0,
        RunMode::Run1,
        RunMode::Run2,
        RunMode::Run3,
        RunMode::Halt0,
        RunMode::Stop0,
    ];
}

/// System clock source as reported by ME_GS.S_SYSCLK.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SysclkSource {
    /// 16 MHz internal RC oscillator.
    Irc = 0,
    /// External crystal oscillator.
    Xosc = 1,
    Fmpll0 = 2,
    Fmpll1 = 3,
}

impl SysclkSource {
    pub(crate) const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(SysclkSource::Irc),
            1 => Some(SysclkSource::Xosc),
            2 => Some(SysclkSource::Fmpll0),
            3 => Some(SysclkSource::Fmpll1),
            _ => None,
        }
    }
}

/// Bit assignments of the per-mode machine-configuration words (ME_\<mode\>_MC).
pub mod mc {
    /// Keep the system clock on the internal RC oscillator.
    pub const SYSCLK_IRC: u32 = super::SysclkSource::Irc as u32;
    /// Run the system clock from the external oscillator.
    pub const SYSCLK_XOSC: u32 = super::SysclkSource::Xosc as u32;
    /// Run the system clock from FMPLL0.
    pub const SYSCLK_FMPLL0: u32 = super::SysclkSource::Fmpll0 as u32;
    /// Run the system clock from FMPLL1.
    pub const SYSCLK_FMPLL1: u32 = super::SysclkSource::Fmpll1 as u32;

    /// Internal RC oscillator on.
    pub const IRCON: u32 = 1 << 4;
    /// External oscillator on.
    pub const XOSC0ON: u32 = 1 << 5;
    /// FMPLL0 on.
    pub const PLL0ON: u32 = 1 << 6;
    /// FMPLL1 on.
    pub const PLL1ON: u32 = 1 << 7;
    /// Code flash in normal power mode.
    pub const CFLAON_NORMAL: u32 = 0b11 << 16;
    /// Data flash in normal power mode.
    pub const DFLAON_NORMAL: u32 = 0b11 << 18;
    /// Both flash arrays in normal power mode.
    pub const FLAON_NORMAL: u32 = CFLAON_NORMAL | DFLAON_NORMAL;
    /// Main voltage regulator on.
    pub const MVRON: u32 = 1 << 20;
}

/// Mode transition error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionError {
    /// The ME unit raised its transition-error flag after the request.
    ///
    /// A hardware-reported handshake error is not self-correcting; the unit
    /// never retries on its own and neither does this driver.
    SwitchRejected { mode: RunMode },
}

/// Per-mode configuration table: enabled modes, one machine-configuration
/// word per run mode, and the RUNPC/LPPC peripheral-control words.
///
/// Values are board-defined bit patterns; this crate only sequences how they
/// reach the hardware. The table takes effect on the next committed mode
/// transition, not when it is written.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeTable {
    /// ME_MER enabled-modes mask.
    pub enabled_modes: u32,
    pub safe: u32,
    pub drun: u32,
    pub run: [u32; 4],
    pub halt0: u32,
    pub stop0: u32,
    /// ME_RUNPC run-mode peripheral-control words.
    pub run_pc: [u32; bus::PERIPH_CTL_COUNT],
    /// ME_LPPC low-power-mode peripheral-control words.
    pub lp_pc: [u32; bus::PERIPH_CTL_COUNT],
}

/// Enables RESET, SAFE, DRUN, RUN0..3, HALT0 and STOP0.
const DEFAULT_ENABLED_MODES: u32 = 0x0000_05FD;

const DEFAULT_MC: u32 = mc::SYSCLK_IRC | mc::IRCON | mc::FLAON_NORMAL | mc::MVRON;

impl ModeTable {
    pub const fn new() -> Self {
        Self {
            enabled_modes: DEFAULT_ENABLED_MODES,
            safe: DEFAULT_MC,
            drun: DEFAULT_MC,
            run: [DEFAULT_MC; 4],
            halt0: DEFAULT_MC,
            stop0: DEFAULT_MC,
            run_pc: [0; bus::PERIPH_CTL_COUNT],
            lp_pc: [0; bus::PERIPH_CTL_COUNT],
        }
    }

    pub const fn with_enabled_modes(mut self, mask: u32) -> Self {
        self.enabled_modes = mask;
        self
    }

    pub const fn with_safe(mut self, word: u32) -> Self {
        self.safe = word;
        self
    }

    pub const fn with_drun(mut self, word: u32) -> Self {
        self.drun = word;
        self
    }

    pub const fn with_run(mut self, index: usize, word: u32) -> Self {
        self.run[index] = word;
        self
    }

    pub const fn with_halt0(mut self, word: u32) -> Self {
        self.halt0 = word;
        self
    }

    pub const fn with_stop0(mut self, word: u32) -> Self {
        self.stop0 = word;
        self
    }

    pub const fn with_run_pc(mut self, index: usize, word: u32) -> Self {
        self.run_pc[index] = word;
        self
    }

    pub const fn with_lp_pc(mut self, index: usize, word: u32) -> Self {
        self.lp_pc[index] = word;
        self
    }

    /// Machine-configuration word for `mode`.
    pub const fn word(&self, mode: RunMode) -> u32 {
        match mode {
            RunMode::Safe => self.safe,
            RunMode::Drun => self.drun,
            RunMode::Run0 => self.run[0],
            RunMode::Run1 => self.run[1],
            RunMode::Run2 => self.run[2],
            RunMode::Run3 => self.run[3],
            RunMode::Halt0 => self.halt0,
            RunMode::Stop0 => self.stop0,
        }
    }
}

impl Default for ModeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Static frequencies of the selectable system clock sources.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceFreqs {
    pub irc: Hertz,
    pub xosc: Hertz,
    pub fmpll0: Hertz,
    pub fmpll1: Hertz,
}

impl SourceFreqs {
    const ZERO: Self = Self {
        irc: Hertz(0),
        xosc: Hertz(0),
        fmpll0: Hertz(0),
        fmpll1: Hertz(0),
    };

    const fn get(&self, source: SysclkSource) -> Hertz {
        match source {
            SysclkSource::Irc => self.irc,
            SysclkSource::Xosc => self.xosc,
            SysclkSource::Fmpll0 => self.fmpll0,
            SysclkSource::Fmpll1 => self.fmpll1,
        }
    }
}

/// Whether `SOURCE_FREQS` has been initialized by `set_source_freqs()`.
static SOURCE_FREQS_INIT: AtomicBool = AtomicBool::new(false);

/// Source frequencies captured from the board configuration at init time.
static mut SOURCE_FREQS: SourceFreqs = SourceFreqs::ZERO;

/// Safety: sets a mutable global; single-threaded bring-up context only.
pub(crate) unsafe fn set_source_freqs(freqs: SourceFreqs) {
    debug!("me: sysclk sources {:?}", freqs);
    unsafe { SOURCE_FREQS = freqs };
    SOURCE_FREQS_INIT.store(true, Ordering::Release);
}

/// Requests a transition and polls until the unit reports the outcome.
///
/// The ME unit always resolves a request, so the poll loop has exactly two
/// exits: the complete flag or the error flag.
pub(crate) fn switch_mode<B: ModeEntryBus>(
    bus: &mut B,
    mode: RunMode,
) -> Result<(), TransitionError> {
    // Stale I_MTC or I_IMODE from an earlier request would be read as this
    // request's outcome.
    bus.write_is(IS_MTC | IS_IMODE);

    let target = (mode as u32) << MCTL_TARGET_SHIFT;
    bus.write_mctl(target | MCTL_KEY);
    bus.write_mctl(target | MCTL_KEY_INV);

    loop {
        let is = bus.read_is();
        if is & IS_MTC != 0 {
            return Ok(());
        }
        if is & IS_IMODE != 0 {
            return Err(TransitionError::SwitchRejected { mode });
        }
    }
}

/// Writes a PCTL byte, then re-requests `target` so the unit re-derives the
/// effective gating from the updated pattern.
pub(crate) fn gate_peripheral<B: ModeEntryBus>(
    bus: &mut B,
    slot: usize,
    pctl: u8,
    target: RunMode,
) -> Result<(), TransitionError> {
    bus.write_pctl(slot, pctl);
    switch_mode(bus, target)
}

/// Maps the reported system clock source to its configured frequency.
/// Reserved encodings yield 0 Hz.
pub(crate) fn read_system_clock<B: ModeEntryBus>(bus: &mut B, freqs: &SourceFreqs) -> Hertz {
    match SysclkSource::from_bits(bus.read_gs() & GS_SYSCLK_MASK) {
        Some(source) => freqs.get(source),
        None => Hertz(0),
    }
}

/// Switches the system to the specified run mode.
///
/// Blocking and non-cancelable; on success the chip's clock and power
/// configuration has physically changed. The error case is surfaced, never
/// retried here.
pub fn request_mode_switch(mode: RunMode) -> Result<(), TransitionError> {
    critical_section::with(|cs| request_mode_switch_with_cs(cs, mode))
}

/// [`request_mode_switch`] inside an already-held critical section.
///
/// The ME unit has a single mode-control register set, so no second request
/// may be issued while one is outstanding.
pub fn request_mode_switch_with_cs(
    _cs: CriticalSection,
    mode: RunMode,
) -> Result<(), TransitionError> {
    switch_mode(&mut { bus::SOC }, mode)
}

/// Changes the clock gating of one peripheral slot.
///
/// The gating change only takes effect once the re-applied transition to
/// `target` commits; `target` must be the mode currently in force, which the
/// caller is responsible for tracking.
pub fn set_peripheral_clock(
    slot: usize,
    pctl: u8,
    target: RunMode,
) -> Result<(), TransitionError> {
    critical_section::with(|cs| set_peripheral_clock_with_cs(cs, slot, pctl, target))
}

/// [`set_peripheral_clock`] inside an already-held critical section.
pub fn set_peripheral_clock_with_cs(
    _cs: CriticalSection,
    slot: usize,
    pctl: u8,
    target: RunMode,
) -> Result<(), TransitionError> {
    gate_peripheral(&mut { bus::SOC }, slot, pctl, target)
}

/// Returns the system clock frequency under the current run mode.
///
/// Returns 0 Hz for reserved source encodings, or when called before
/// [`crate::init`] has captured the board frequencies. 0 Hz is the caller's
/// "unknown" sentinel, e.g. to avoid dividing by zero in tick setup.
pub fn system_clock() -> Hertz {
    if !SOURCE_FREQS_INIT.load(Ordering::Acquire) {
        return Hertz(0);
    }
    let freqs = unsafe { &*core::ptr::addr_of!(SOURCE_FREQS) };
    read_system_clock(&mut { bus::SOC }, freqs)
}

#[cfg(test)]
mod tests;

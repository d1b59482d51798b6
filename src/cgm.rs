//! CGM (clock generation module): oscillator bypass, dividers, source
//! selectors and FMPLL settings.
//!
//! Everything programmed here is inert until the ME unit commits a mode
//! transition; the bring-up sequence in [`crate::boot`] drives the ordering.

use crate::bus::ClockGenBus;
use crate::time::Hertz;

/// Number of auxiliary clock groups (AC0..AC4).
pub const AUX_CLOCK_COUNT: usize = 5;

/// Number of FMPLL units.
pub const PLL_COUNT: usize = 2;

/// FMPLL output divider (CR ODF field).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PllOutputDivider {
    Div2 = 0,
    Div4 = 1,
    Div8 = 2,
    Div16 = 3,
}

impl PllOutputDivider {
    const fn divisor(self) -> u32 {
        2 << self as u32
    }
}

/// FMPLL divider settings.
///
/// `output = xosc / idf * ndiv / odf`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pll {
    /// Input division factor, 1..=15.
    pub idf: u8,
    /// Loop division factor (feedback multiplier), 32..=96.
    pub ndiv: u8,
    /// Output division factor.
    pub odf: PllOutputDivider,
}

impl Pll {
    pub const fn new(idf: u8, ndiv: u8, odf: PllOutputDivider) -> Self {
        Self { idf, ndiv, odf }
    }

    pub const fn with_idf(mut self, idf: u8) -> Self {
        self.idf = idf;
        self
    }

    pub const fn with_ndiv(mut self, ndiv: u8) -> Self {
        self.ndiv = ndiv;
        self
    }

    pub const fn with_odf(mut self, odf: PllOutputDivider) -> Self {
        self.odf = odf;
        self
    }

    /// CR word: ODF, IDF (stored minus one) and NDIV in their fields.
    pub(crate) const fn control_word(&self) -> u32 {
        ((self.idf as u32 - 1) << 26) | ((self.odf as u32) << 24) | ((self.ndiv as u32) << 16)
    }

    /// Locked output frequency for the given reference input.
    pub const fn output_freq(&self, reference: Hertz) -> Hertz {
        Hertz(reference.0 / self.idf as u32 * self.ndiv as u32 / self.odf.divisor())
    }
}

impl Default for Pll {
    /// 120 MHz from a 40 MHz crystal (40 / 8 * 48 / 2).
    fn default() -> Self {
        Self::new(8, 48, PllOutputDivider::Div2)
    }
}

/// Source selector and divider words for one auxiliary clock group.
///
/// Raw register words as defined by the reference manual; board-supplied.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuxClock {
    pub source: u32,
    pub dividers: u32,
}

impl AuxClock {
    pub const fn new(source: u32, dividers: u32) -> Self {
        Self { source, dividers }
    }
}

/// Static CGM configuration.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// The board carries an active external oscillator instead of a crystal.
    pub osc_bypass: bool,
    /// CGM_SC_DC0 system clock divider word.
    pub sysclk_divider: u32,
    /// Auxiliary clock groups AC0..AC4.
    pub aux: [AuxClock; AUX_CLOCK_COUNT],
    /// FMPLL0 and FMPLL1 settings.
    pub pll: [Pll; PLL_COUNT],
}

impl ClockConfig {
    pub const fn new() -> Self {
        Self {
            osc_bypass: false,
            sysclk_divider: 0,
            aux: [AuxClock::new(0, 0); AUX_CLOCK_COUNT],
            pll: [
                Pll::new(8, 48, PllOutputDivider::Div2),
                Pll::new(8, 48, PllOutputDivider::Div2),
            ],
        }
    }

    pub const fn with_osc_bypass(mut self, bypass: bool) -> Self {
        self.osc_bypass = bypass;
        self
    }

    pub const fn with_sysclk_divider(mut self, word: u32) -> Self {
        self.sysclk_divider = word;
        self
    }

    pub const fn with_aux(mut self, group: usize, aux: AuxClock) -> Self {
        self.aux[group] = aux;
        self
    }

    pub const fn with_pll(mut self, pll: usize, settings: Pll) -> Self {
        self.pll[pll] = settings;
        self
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Programs the system clock divider and the auxiliary selectors/dividers.
pub(crate) fn apply_dividers<B: ClockGenBus>(bus: &mut B, config: &ClockConfig) {
    bus.write_sc_dc0(config.sysclk_divider);
    for (group, aux) in config.aux.iter().enumerate() {
        bus.write_aux_dc(group, aux.dividers);
        bus.write_aux_sc(group, aux.source);
    }
}

/// Programs the FMPLL control registers.
pub(crate) fn apply_plls<B: ClockGenBus>(bus: &mut B, config: &ClockConfig) {
    for (pll, settings) in config.pll.iter().enumerate() {
        bus.write_pll_cr(pll, settings.control_word());
        // TODO: modulation (MR) settings once a board needs spread spectrum.
        bus.write_pll_mr(pll, 0);
    }
}

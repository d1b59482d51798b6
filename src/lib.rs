#![no_std]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

#[cfg(test)]
extern crate std;

pub mod boot;
pub mod bus;
pub mod cgm;
pub mod me;
pub mod time;

/// HAL configuration for the SPC56EL clock and mode subsystem.
pub mod config {
    use crate::boot::FlashTiming;
    use crate::cgm::ClockConfig;
    use crate::me::{ModeTable, SourceFreqs};
    use crate::time::Hertz;

    /// Board-static configuration passed when initializing.
    ///
    /// Read-only input: this crate sequences the hardware protocol for
    /// applying these values, it does not decide them.
    #[derive(Debug, Clone, Copy)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Config {
        /// Skip everything but the oscillator-stability wait (embedded test
        /// harness / already-initialized scenarios).
        pub no_init: bool,
        /// Internal RC oscillator frequency.
        pub irc: Hertz,
        /// External oscillator frequency.
        pub xosc: Hertz,
        pub cgm: ClockConfig,
        pub modes: ModeTable,
        pub flash: FlashTiming,
    }

    impl Config {
        pub const fn new() -> Self {
            Self {
                no_init: false,
                irc: Hertz::mhz(16),
                xosc: Hertz::mhz(40),
                cgm: ClockConfig::new(),
                modes: ModeTable::new(),
                flash: FlashTiming::new(3, 3, 3),
            }
        }

        pub const fn with_no_init(mut self, no_init: bool) -> Self {
            self.no_init = no_init;
            self
        }

        pub const fn with_irc(mut self, irc: Hertz) -> Self {
            self.irc = irc;
            self
        }

        pub const fn with_xosc(mut self, xosc: Hertz) -> Self {
            self.xosc = xosc;
            self
        }

        pub const fn with_cgm(mut self, cgm: ClockConfig) -> Self {
            self.cgm = cgm;
            self
        }

        pub const fn with_modes(mut self, modes: ModeTable) -> Self {
            self.modes = modes;
            self
        }

        pub const fn with_flash(mut self, flash: FlashTiming) -> Self {
            self.flash = flash;
            self
        }

        /// Frequencies of the selectable system clock sources under this
        /// configuration.
        pub(crate) const fn source_freqs(&self) -> SourceFreqs {
            SourceFreqs {
                irc: self.irc,
                xosc: self.xosc,
                fmpll0: self.cgm.pll[0].output_freq(self.xosc),
                fmpll1: self.cgm.pll[1].output_freq(self.xosc),
            }
        }
    }

    impl Default for Config {
        fn default() -> Self {
            Self::new()
        }
    }
}
pub use config::Config;

/// Initialize the clock and mode subsystem with the provided configuration.
///
/// Runs the one-shot bring-up sequence and captures the source frequencies
/// for [`me::system_clock`]. Must be called exactly once, immediately after
/// reset, before interrupts are enabled.
///
/// An `Err` is fatal by contract: bare-metal callers should halt rather than
/// continue in an unknown clock state.
pub fn init(config: Config) -> Result<(), boot::BringUpError> {
    unsafe {
        boot::early_init(&config)?;
        me::set_source_freqs(config.source_freqs());
    }
    Ok(())
}

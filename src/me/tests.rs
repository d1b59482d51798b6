use super::*;
use crate::bus::sim::{Event, SimBus};

#[test]
fn switch_success_commits_requested_mode() {
    for mode in RunMode::ALL {
        let mut sim = SimBus::new();
        sim.set_current_mode(RunMode::Safe);

        assert_eq!(switch_mode(&mut sim, mode), Ok(()));
        assert_eq!(sim.current_mode_bits(), mode as u32);
    }
}

#[test]
fn switch_error_reports_failure_and_leaves_mode() {
    for mode in RunMode::ALL {
        let mut sim = SimBus::with_is_script(&[IS_IMODE]);
        sim.set_current_mode(RunMode::Run1);

        assert_eq!(
            switch_mode(&mut sim, mode),
            Err(TransitionError::SwitchRejected { mode })
        );
        assert_eq!(sim.current_mode_bits(), RunMode::Run1 as u32);
    }
}

/// The double write is the hardware's confirmation handshake: same target,
/// key field bitwise-inverted, never a single write.
#[test]
fn switch_writes_key_then_inverted_key() {
    let mut sim = SimBus::new();
    switch_mode(&mut sim, RunMode::Run0).unwrap();

    let target = (RunMode::Run0 as u32) << MCTL_TARGET_SHIFT;
    let mctl = sim.mctl_writes();
    assert_eq!(mctl.len(), 2);
    assert_eq!(mctl[0], target | MCTL_KEY);
    assert_eq!(mctl[1], target | MCTL_KEY_INV);
    // The two words differ only in the key field.
    assert_eq!(mctl[0] ^ mctl[1], MCTL_KEY ^ MCTL_KEY_INV);
}

#[test]
fn switch_clears_stale_status_flags_first() {
    let mut sim = SimBus::new();
    switch_mode(&mut sim, RunMode::Run2).unwrap();

    assert_eq!(sim.events[0], Event::IsWrite(IS_MTC | IS_IMODE));
    let first_mctl = sim.position(|e| matches!(e, Event::Mctl(_))).unwrap();
    assert!(first_mctl > 0);
}

/// No premature or missed detection: success on the third poll means exactly
/// three status reads.
#[test]
fn switch_polls_status_until_completion() {
    let mut sim = SimBus::with_is_script(&[0, 0, IS_MTC]);

    assert_eq!(switch_mode(&mut sim, RunMode::Run0), Ok(()));
    assert_eq!(sim.is_reads, 3);
}

#[test]
fn gate_peripheral_writes_pctl_before_reapplying_mode() {
    let mut sim = SimBus::new();

    assert_eq!(gate_peripheral(&mut sim, 32, 0xFE, RunMode::Run0), Ok(()));
    assert_eq!(sim.events[0], Event::Pctl(32, 0xFE));

    let first_mctl = sim.position(|e| matches!(e, Event::Mctl(_))).unwrap();
    assert!(first_mctl > 0);
    let target = (RunMode::Run0 as u32) << MCTL_TARGET_SHIFT;
    assert_eq!(sim.mctl_writes(), std::vec![target | MCTL_KEY, target | MCTL_KEY_INV]);
}

#[test]
fn gate_peripheral_surfaces_reapply_failure() {
    let mut sim = SimBus::with_is_script(&[IS_IMODE]);

    assert_eq!(
        gate_peripheral(&mut sim, 5, 0x00, RunMode::Run3),
        Err(TransitionError::SwitchRejected {
            mode: RunMode::Run3
        })
    );
}

#[test]
fn system_clock_maps_each_recognized_source() {
    let freqs = SourceFreqs {
        irc: Hertz::mhz(16),
        xosc: Hertz::mhz(40),
        fmpll0: Hertz::mhz(120),
        fmpll1: Hertz::mhz(80),
    };

    let cases = [
        (SysclkSource::Irc, freqs.irc),
        (SysclkSource::Xosc, freqs.xosc),
        (SysclkSource::Fmpll0, freqs.fmpll0),
        (SysclkSource::Fmpll1, freqs.fmpll1),
    ];
    for (source, expected) in cases {
        let mut sim = SimBus::new();
        sim.set_sysclk_bits(source as u32);
        assert_eq!(read_system_clock(&mut sim, &freqs), expected);
    }
}

#[test]
fn system_clock_reads_zero_for_reserved_encodings() {
    let freqs = SourceFreqs {
        irc: Hertz::mhz(16),
        xosc: Hertz::mhz(40),
        fmpll0: Hertz::mhz(120),
        fmpll1: Hertz::mhz(80),
    };

    for bits in 4..=15u32 {
        let mut sim = SimBus::new();
        sim.set_sysclk_bits(bits);
        assert_eq!(read_system_clock(&mut sim, &freqs), Hertz(0));
    }
}

#[test]
fn system_clock_reports_configured_irc_frequency() {
    let freqs = SourceFreqs {
        irc: Hertz(16_000_000),
        xosc: Hertz(0),
        fmpll0: Hertz(0),
        fmpll1: Hertz(0),
    };

    let mut sim = SimBus::new();
    sim.set_sysclk_bits(SysclkSource::Irc as u32);
    assert_eq!(read_system_clock(&mut sim, &freqs), Hertz(16_000_000));
}

#[test]
fn default_mode_table_enables_every_run_mode() {
    let table = ModeTable::new();
    for mode in RunMode::ALL {
        assert_ne!(
            table.enabled_modes & (1 << mode as u32),
            0,
            "mode {:?} not enabled by default",
            mode
        );
    }
}

#[test]
fn mode_table_word_selects_per_mode_entry() {
    let table = ModeTable::new()
        .with_drun(0x11)
        .with_run(2, 0x22)
        .with_stop0(0x33);

    assert_eq!(table.word(RunMode::Drun), 0x11);
    assert_eq!(table.word(RunMode::Run2), 0x22);
    assert_eq!(table.word(RunMode::Stop0), 0x33);
    assert_eq!(table.word(RunMode::Run0), table.run[0]);
}

//! Expectation builders for driving the driver against
//! `embedded_hal_mock`.

use crate::{tuning::DEFAULT_TUNING_SETTINGS, ClockSource, DEFAULT_ADDRESS};
use core::cell::Cell;
use embedded_hal_mock::eh1::i2c::Transaction;

/// A register read at the default address.
pub(crate) fn read(register: u8, data: &[u8]) -> Transaction {
    Transaction::write_read(DEFAULT_ADDRESS, vec![register], data.to_vec())
}

/// A register write at the default address.
pub(crate) fn write(register: u8, data: &[u8]) -> Transaction {
    let mut bytes = vec![register];
    bytes.extend_from_slice(data);
    Transaction::write(DEFAULT_ADDRESS, bytes)
}

/// Advances one millisecond every time it is read.
#[derive(Default)]
pub(crate) struct TickClock(Cell<u32>);

impl ClockSource for TickClock {
    fn get_ms(&self) -> u32 {
        let now = self.0.get();
        self.0.set(now + 1);
        now
    }
}

/// Raw contents of the registers read back by the sequence step queries.
/// Defaults to what the device holds after the tuning settings are loaded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Registers {
    sequence_config: u8,
    pre_range_vcsel: u8,
    msrc_timeout: u8,
    pre_range_timeout: u16,
    final_range_vcsel: u8,
    final_range_timeout: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            sequence_config: 0xE8,
            // 14 pclks
            pre_range_vcsel: 0x06,
            // 38 mclks
            msrc_timeout: 0x25,
            // 151 mclks
            pre_range_timeout: 0x0096,
            // 10 pclks
            final_range_vcsel: 0x04,
            // 509 mclks
            final_range_timeout: 0x01FE,
        }
    }
}

impl Registers {
    pub(crate) fn sequence_config(mut self, value: u8) -> Self {
        self.sequence_config = value;
        self
    }

    pub(crate) fn pre_range_vcsel(mut self, value: u8) -> Self {
        self.pre_range_vcsel = value;
        self
    }

    pub(crate) fn msrc_timeout(mut self, value: u8) -> Self {
        self.msrc_timeout = value;
        self
    }

    pub(crate) fn pre_range_timeout(mut self, value: u16) -> Self {
        self.pre_range_timeout = value;
        self
    }

    pub(crate) fn final_range_vcsel(mut self, value: u8) -> Self {
        self.final_range_vcsel = value;
        self
    }

    pub(crate) fn final_range_timeout(mut self, value: u16) -> Self {
        self.final_range_timeout = value;
        self
    }
}

/// Reads issued when the enabled steps and their timeouts are fetched.
pub(crate) fn sequence_reads(registers: &Registers) -> Vec<Transaction> {
    vec![
        read(0x01, &[registers.sequence_config]),
        read(0x50, &[registers.pre_range_vcsel]),
        read(0x46, &[registers.msrc_timeout]),
        read(0x51, &registers.pre_range_timeout.to_be_bytes()),
        read(0x70, &[registers.final_range_vcsel]),
        read(0x71, &registers.final_range_timeout.to_be_bytes()),
    ]
}

/// Writing the stop variable back before a measurement is started.
pub(crate) fn stop_variable_sequence(stop_variable: u8) -> Vec<Transaction> {
    vec![
        write(0x80, &[0x01]),
        write(0xFF, &[0x01]),
        write(0x00, &[0x00]),
        write(0x91, &[stop_variable]),
        write(0x00, &[0x01]),
        write(0xFF, &[0x00]),
        write(0x80, &[0x00]),
    ]
}

/// A reference calibration that completes on the first status poll.
pub(crate) fn single_ref_calibration(vhv_init_byte: u8) -> Vec<Transaction> {
    vec![
        write(0x00, &[0x01 | vhv_init_byte]),
        read(0x13, &[0x07]),
        write(0x0B, &[0x01]),
        write(0x00, &[0x00]),
    ]
}

/// What the simulated device reports during initialisation.
pub(crate) struct InitOptions {
    pub(crate) io_2v8: bool,
    pub(crate) stop_variable: u8,
    /// Five aperture SPADs.
    pub(crate) spad_info: u8,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            io_2v8: true,
            stop_variable: 0x3C,
            spad_info: 0x85,
        }
    }
}

/// Everything `init` does up to and including the NVM read trigger.
pub(crate) fn spad_info_prefix(options: &InitOptions) -> Vec<Transaction> {
    let mut expectations = Vec::new();

    if options.io_2v8 {
        expectations.extend([read(0x89, &[0x00]), write(0x89, &[0x01])]);
    }
    expectations.push(write(0x88, &[0x00]));

    expectations.extend([
        write(0x80, &[0x01]),
        write(0xFF, &[0x01]),
        write(0x00, &[0x00]),
        read(0x91, &[options.stop_variable]),
        write(0x00, &[0x01]),
        write(0xFF, &[0x00]),
        write(0x80, &[0x00]),
    ]);

    expectations.extend([
        read(0x60, &[0x00]),
        write(0x60, &[0x12]),
        // 0.25 MCPS
        write(0x44, &[0x00, 0x20]),
        write(0x01, &[0xFF]),
    ]);

    expectations.extend([
        write(0x80, &[0x01]),
        write(0xFF, &[0x01]),
        write(0x00, &[0x00]),
        write(0xFF, &[0x06]),
        read(0x83, &[0x00]),
        write(0x83, &[0x04]),
        write(0xFF, &[0x07]),
        write(0x81, &[0x01]),
        write(0x80, &[0x01]),
        write(0x94, &[0x6B]),
        write(0x83, &[0x00]),
    ]);

    expectations
}

/// The complete `init` exchange for a device that answers every poll at once.
pub(crate) fn init_sequence(options: &InitOptions) -> Vec<Transaction> {
    let mut expectations = spad_info_prefix(options);

    expectations.extend([
        read(0x83, &[0x10]),
        write(0x83, &[0x01]),
        read(0x92, &[options.spad_info]),
        write(0x81, &[0x00]),
        write(0xFF, &[0x06]),
        read(0x83, &[0x04]),
        write(0x83, &[0x00]),
        write(0xFF, &[0x01]),
        write(0x00, &[0x01]),
        write(0xFF, &[0x00]),
        write(0x80, &[0x00]),
    ]);

    // reference SPADs: bits 12..=16 stay enabled for five aperture SPADs
    expectations.extend([
        read(0xB0, &[0xFF; 6]),
        write(0xFF, &[0x01]),
        write(0x4F, &[0x00]),
        write(0x4E, &[0x2C]),
        write(0xFF, &[0x00]),
        write(0xB6, &[0xB4]),
        Transaction::transaction_start(DEFAULT_ADDRESS),
        Transaction::write(DEFAULT_ADDRESS, vec![0xB0]),
        Transaction::write(DEFAULT_ADDRESS, vec![0x00, 0xF0, 0x01, 0x00, 0x00, 0x00]),
        Transaction::transaction_end(DEFAULT_ADDRESS),
    ]);

    expectations.extend(
        DEFAULT_TUNING_SETTINGS
            .iter()
            .map(|&(register, value)| write(register, &[value])),
    );

    expectations.extend([
        write(0x0A, &[0x04]),
        read(0x84, &[0x11]),
        write(0x84, &[0x01]),
        write(0x0B, &[0x01]),
    ]);

    // 33971 us with every step enabled
    expectations.extend(sequence_reads(&Registers::default().sequence_config(0xF8)));
    expectations.push(write(0x01, &[0xE8]));

    // 33971 - 17067 us left = 443 mclks at 10 pclks, plus 151 pre-range mclks
    expectations.extend(sequence_reads(&Registers::default()));
    expectations.push(write(0x71, &[0x02, 0x94]));

    expectations.push(write(0x01, &[0x01]));
    expectations.extend(single_ref_calibration(0x40));
    expectations.push(write(0x01, &[0x02]));
    expectations.extend(single_ref_calibration(0x00));
    expectations.push(write(0x01, &[0xE8]));

    expectations
}

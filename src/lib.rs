#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]

mod fmt; // <-- must be first module!

mod budget;
mod bus;
mod init;
mod ranging;
mod reg;
mod sequence;
mod timing;
mod tuning;
mod vcsel;

#[cfg(test)]
mod testing;

pub use budget::MIN_TIMING_BUDGET_US;
pub use ranging::{RangingMode, TIMEOUT_RANGE_MM};
pub use sequence::{SequenceStepEnables, SequenceStepTimeouts};
pub use vcsel::VcselPeriodType;

use reg::{Page, Register};

/// The default I2C address for the VL53L0X.
pub const DEFAULT_ADDRESS: u8 = 0b010_1001;

/// Possible errors returned by the driver.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<EI2C> {
    /// An error occurred on the I2C bus.
    I2C(EI2C),

    /// The signal rate limit was outside `0.0..=511.99` MCPS.
    InvalidSignalRateLimit(f32),
    /// The VCSEL pulse period is not one of the even values valid for this
    /// phase.
    InvalidVcselPeriod(VcselPeriodType, u8),
    /// The measurement timing budget was below the 20 ms minimum.
    TimingBudgetTooShort(u32),
    /// The enabled sequence steps leave no time for the final range.
    TimingBudgetExceeded {
        /// The requested budget.
        budget_us: u32,
        /// Time already taken by the other sequence steps.
        used_us: u32,
    },
    /// The device did not respond before the IO timeout expired.
    Timeout,
}

impl<EI2C: core::fmt::Debug> core::fmt::Display for Error<EI2C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<EI2C> From<EI2C> for Error<EI2C> {
    fn from(error: EI2C) -> Self {
        Error::I2C(error)
    }
}

/// A time source with millisecond precision.
pub trait ClockSource {
    /// Get the current time in milliseconds.
    fn get_ms(&self) -> u32;
}

impl<T: ClockSource + ?Sized> ClockSource for &T {
    fn get_ms(&self) -> u32 {
        (**self).get_ms()
    }
}

/// Settings applied when the driver is created and initialised.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    io_2v8: bool,
    io_timeout_ms: u32,
    signal_rate_limit_mcps: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_2v8: true,
            io_timeout_ms: 500,
            signal_rate_limit_mcps: 0.25,
        }
    }
}

impl Config {
    /// Switch the sensor IO to 2V8 mode during initialisation. The sensor
    /// starts in 1V8 mode.
    #[must_use]
    pub fn io_2v8(mut self, io_2v8: bool) -> Self {
        self.io_2v8 = io_2v8;
        self
    }

    /// Upper bound for every busy-wait on the device, in milliseconds. Zero
    /// waits forever.
    #[must_use]
    pub fn io_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.io_timeout_ms = timeout_ms;
        self
    }

    /// Final range signal rate limit written during initialisation.
    #[must_use]
    pub fn signal_rate_limit_mcps(mut self, limit_mcps: f32) -> Self {
        self.signal_rate_limit_mcps = limit_mcps;
        self
    }
}

/// A VL53L0X driver. Use the `new` function to create a new instance, then
/// `init` to bring the sensor up before ranging.
pub struct Vl53l0x<I2C, C> {
    i2c: I2C,
    clock: C,
    address: u8,
    page: u8,

    io_2v8: bool,
    io_timeout_ms: u32,
    signal_rate_limit_mcps: f32,

    stop_variable: u8,
    measurement_timing_budget_us: u32,
    did_timeout: bool,
    mode: RangingMode,
}

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    /// Create a new instance of the VL53L0X driver at [`DEFAULT_ADDRESS`].
    /// Nothing is sent on the bus until [`init`](Self::init) is called.
    ///
    /// The clock is used to bound every wait on the device, see
    /// [`Config::io_timeout_ms`].
    pub fn new(i2c: I2C, clock: C, config: Config) -> Self {
        Self {
            i2c,
            clock,
            address: DEFAULT_ADDRESS,
            page: Page::Default as u8,

            io_2v8: config.io_2v8,
            io_timeout_ms: config.io_timeout_ms,
            signal_rate_limit_mcps: config.signal_rate_limit_mcps,

            stop_variable: 0,
            measurement_timing_budget_us: 0,
            did_timeout: false,
            mode: RangingMode::Idle,
        }
    }

    /// Give back the bus.
    #[must_use]
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// The address the driver currently talks to.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Change the device address. The write goes to the current address and
    /// every later access uses the new one. The device forgets the address
    /// when it is powered off.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn set_address(&mut self, new_addr: u8) -> Result<(), Error<EI2C>> {
        self.write(Register::I2cSlaveDeviceAddress, new_addr & 0x7F)?;
        self.address = new_addr & 0x7F;
        info!("address changed to {}", self.address);
        Ok(())
    }

    /// Current IO timeout in milliseconds.
    #[must_use]
    pub fn io_timeout(&self) -> u32 {
        self.io_timeout_ms
    }

    /// Set the IO timeout in milliseconds, zero disables it.
    pub fn set_io_timeout(&mut self, timeout_ms: u32) {
        self.io_timeout_ms = timeout_ms;
    }

    /// Whether initialisation switched the sensor to 2V8 IO.
    #[must_use]
    pub fn io_2v8(&self) -> bool {
        self.io_2v8
    }

    /// Set the return signal rate limit check value in units of MCPS (mega
    /// counts per second). A lower limit increases the potential range of the
    /// sensor but also the likelihood of an inaccurate reading from unwanted
    /// reflections. Defaults to 0.25 MCPS.
    ///
    /// # Errors
    /// Fails with [`Error::InvalidSignalRateLimit`] outside `0.0..=511.99`,
    /// and forwards any errors from the I2C bus.
    pub fn set_signal_rate_limit(&mut self, limit_mcps: f32) -> Result<(), Error<EI2C>> {
        if !(0.0..=511.99).contains(&limit_mcps) {
            warn!("rejected signal rate limit {}", limit_mcps);
            return Err(Error::InvalidSignalRateLimit(limit_mcps));
        }

        // Q9.7 fixed point format (9 integer bits, 7 fractional bits)
        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        self.write_u16(
            Register::FinalRangeConfigMinCountRateRtnLimit,
            (limit_mcps * f32::from(1_u16 << 7)) as u16,
        )?;
        self.signal_rate_limit_mcps = limit_mcps;
        Ok(())
    }

    /// Get the return signal rate limit check value in MCPS.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn get_signal_rate_limit(&mut self) -> Result<f32, Error<EI2C>> {
        let raw = self.read_u16(Register::FinalRangeConfigMinCountRateRtnLimit)?;
        Ok(f32::from(raw) / f32::from(1_u16 << 7))
    }

    /// Read the model ID, `0xEE` for a VL53L0X.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn model_id(&mut self) -> Result<u8, Error<EI2C>> {
        self.read(Register::IdentificationModelId)
    }

    /// Read the silicon revision ID.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn revision_id(&mut self) -> Result<u8, Error<EI2C>> {
        self.read(Register::IdentificationRevisionId)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{read, write, TickClock};
    use crate::{Config, Error, Vl53l0x, DEFAULT_ADDRESS};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn set_address_writes_at_old_address_then_switches() {
        let mut i2c = I2cMock::new(&[
            write(0x8A, &[0x30]),
            Transaction::write_read(0x30, vec![0xC0], vec![0xEE]),
        ]);
        let mut dev = Vl53l0x::new(i2c.clone(), TickClock::default(), Config::default());

        dev.set_address(0x30).unwrap();
        assert_eq!(dev.address(), 0x30);
        assert_eq!(dev.model_id().unwrap(), 0xEE);

        i2c.done();
    }

    #[test]
    fn set_address_masks_to_seven_bits() {
        let mut i2c = I2cMock::new(&[write(0x8A, &[0x31])]);
        let mut dev = Vl53l0x::new(i2c.clone(), TickClock::default(), Config::default());

        dev.set_address(0xB1).unwrap();
        assert_eq!(dev.address(), 0x31);

        i2c.done();
    }

    #[test]
    fn signal_rate_limit_uses_q9_7() {
        let mut i2c = I2cMock::new(&[
            write(0x44, &[0x00, 0x20]),
            read(0x44, &[0x00, 0x20]),
        ]);
        let mut dev = Vl53l0x::new(i2c.clone(), TickClock::default(), Config::default());

        dev.set_signal_rate_limit(0.25).unwrap();
        assert!((dev.get_signal_rate_limit().unwrap() - 0.25).abs() < f32::EPSILON);

        i2c.done();
    }

    #[test]
    fn signal_rate_limit_out_of_range_is_rejected() {
        let mut i2c = I2cMock::new(&[]);
        let mut dev = Vl53l0x::new(i2c.clone(), TickClock::default(), Config::default());

        assert!(matches!(
            dev.set_signal_rate_limit(512.0),
            Err(Error::InvalidSignalRateLimit(_))
        ));
        assert!(matches!(
            dev.set_signal_rate_limit(-0.5),
            Err(Error::InvalidSignalRateLimit(_))
        ));

        i2c.done();
    }

    #[test]
    fn config_defaults() {
        let i2c = I2cMock::new(&[]);
        let dev = Vl53l0x::new(i2c.clone(), TickClock::default(), Config::default());

        assert_eq!(dev.address(), DEFAULT_ADDRESS);
        assert_eq!(dev.io_timeout(), 500);
        assert!(dev.io_2v8());

        dev.release().done();
    }
}

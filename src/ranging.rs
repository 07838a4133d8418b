use crate::{
    reg::{sysrange, PrivateRegister, Register, RESULT_RANGE_OFFSET},
    ClockSource, Error, Vl53l0x,
};

/// Returned by [`Vl53l0x::read_range_single_millimeters`] when the
/// measurement did not start in time. Check
/// [`Vl53l0x::timeout_occurred`] to tell it apart from a reading.
pub const TIMEOUT_RANGE_MM: u16 = 65535;

/// What the ranging engine was last told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangingMode {
    Idle,
    /// Measuring as often as possible.
    ContinuousBackToBack,
    /// Measuring at a fixed inter-measurement period.
    ContinuousTimed,
    /// A single-shot measurement was triggered and has not been read yet.
    SingleShotPending,
}

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    /// Start continuous ranging measurements. If `period_ms` is 0,
    /// continuous back-to-back mode is used (the sensor takes measurements as
    /// often as possible); otherwise, continuous timed mode is used, with the
    /// given inter-measurement period in milliseconds.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn start_continuous(&mut self, mut period_ms: u32) -> Result<(), Error<EI2C>> {
        self.restore_stop_variable()?;

        if period_ms != 0 {
            let osc_calibrate_val = self.read_u16(Register::OscCalibrateVal)?;

            if osc_calibrate_val != 0 {
                period_ms = period_ms.saturating_mul(u32::from(osc_calibrate_val));
            }

            self.write_u32(Register::SystemIntermeasurementPeriod, period_ms)?;
            self.write(Register::SysrangeStart, sysrange::TIMED)?;
            self.mode = RangingMode::ContinuousTimed;
        } else {
            self.write(Register::SysrangeStart, sysrange::BACK_TO_BACK)?;
            self.mode = RangingMode::ContinuousBackToBack;
        }

        debug!("continuous ranging started");
        Ok(())
    }

    /// Stop continuous measurements.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn stop_continuous(&mut self) -> Result<(), Error<EI2C>> {
        self.write(Register::SysrangeStart, sysrange::START_STOP)?;

        self.with_private_page(|this| this.write(PrivateRegister::StopVariable, 0x00))?;

        self.mode = RangingMode::Idle;
        debug!("continuous ranging stopped");
        Ok(())
    }

    /// Whether a new measurement is waiting to be read.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn is_range_ready(&mut self) -> Result<bool, Error<EI2C>> {
        Ok(self.read(Register::ResultInterruptStatus)? & 0x07 != 0)
    }

    /// Read the latest range in millimeters and clear the interrupt. This does
    /// not wait for a new measurement, see [`is_range_ready`](Self::is_range_ready).
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn read_range_continuous_millimeters(&mut self) -> Result<u16, Error<EI2C>> {
        // assumptions: Linearity Corrective Gain is 1000 (default);
        // fractional ranging is not enabled
        let range = self.read_u16(Register::ResultRangeStatus as u8 + RESULT_RANGE_OFFSET)?;

        self.write(Register::SystemInterruptClear, 0x01)?;

        Ok(range)
    }

    /// Poll the device for a new range value. Returns `None` if the device is
    /// still measuring.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn try_read(&mut self) -> Result<Option<u16>, Error<EI2C>> {
        if !self.is_range_ready()? {
            return Ok(None);
        }
        self.read_range_continuous_millimeters().map(Some)
    }

    /// Perform a single-shot range measurement and return the reading in
    /// millimeters. Returns [`TIMEOUT_RANGE_MM`] and sets the timeout flag if
    /// the measurement did not start within the IO timeout.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn read_range_single_millimeters(&mut self) -> Result<u16, Error<EI2C>> {
        self.restore_stop_variable()?;

        self.write(Register::SysrangeStart, sysrange::START_STOP)?;
        self.mode = RangingMode::SingleShotPending;

        // "Wait until start bit has been cleared"
        match self.poll_until(|this| {
            Ok(this.read(Register::SysrangeStart)? & sysrange::START_STOP == 0)
        }) {
            Ok(()) => {}
            Err(Error::Timeout) => {
                self.mode = RangingMode::Idle;
                return Ok(TIMEOUT_RANGE_MM);
            }
            Err(e) => return Err(e),
        }

        let range = self.read_range_continuous_millimeters()?;
        self.mode = RangingMode::Idle;
        Ok(range)
    }

    /// Whether a wait on the device timed out since the last call. Reading
    /// clears the flag.
    pub fn timeout_occurred(&mut self) -> bool {
        core::mem::take(&mut self.did_timeout)
    }

    /// The current ranging mode.
    #[must_use]
    pub fn mode(&self) -> RangingMode {
        self.mode
    }
}

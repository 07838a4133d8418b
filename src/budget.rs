use crate::{
    reg::Register,
    sequence::{SequenceStepEnables, SequenceStepTimeouts},
    timing::{encode_timeout, timeout_microseconds_to_mclks},
    ClockSource, Error, Vl53l0x,
};

/// The budget is applied with a smaller start overhead than it is read back
/// with. The asymmetry comes from the vendor API.
const SET_START_OVERHEAD: u32 = 1320;
const GET_START_OVERHEAD: u32 = 1910;
const END_OVERHEAD: u32 = 960;
const MSRC_OVERHEAD: u32 = 660;
const TCC_OVERHEAD: u32 = 590;
const DSS_OVERHEAD: u32 = 690;
const PRE_RANGE_OVERHEAD: u32 = 660;
const FINAL_RANGE_OVERHEAD: u32 = 550;

/// Shortest budget accepted by [`Vl53l0x::set_measurement_timing_budget`].
pub const MIN_TIMING_BUDGET_US: u32 = 20_000;

/// Time taken by every step except the final range timeout itself.
fn budget_before_final_range(
    start_overhead: u32,
    enables: SequenceStepEnables,
    timeouts: &SequenceStepTimeouts,
) -> u32 {
    // "Start and end overhead times always present"
    let mut budget_us = start_overhead + END_OVERHEAD;

    if enables.tcc {
        budget_us += timeouts.msrc_dss_tcc_us + TCC_OVERHEAD;
    }

    if enables.dss {
        budget_us += 2 * (timeouts.msrc_dss_tcc_us + DSS_OVERHEAD);
    } else if enables.msrc {
        budget_us += timeouts.msrc_dss_tcc_us + MSRC_OVERHEAD;
    }

    if enables.pre_range {
        budget_us += timeouts.pre_range_us + PRE_RANGE_OVERHEAD;
    }

    budget_us
}

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    /// Set the measurement timing budget in microseconds, the time allowed
    /// for one measurement. Whatever the other enabled sequence steps leave
    /// over is given to the final range step. Increasing the budget by a
    /// factor of N decreases the range standard deviation by a factor of
    /// sqrt(N). Defaults to about 33 ms, the minimum is 20 ms.
    ///
    /// # Errors
    /// Fails with [`Error::TimingBudgetTooShort`] below
    /// [`MIN_TIMING_BUDGET_US`] and with [`Error::TimingBudgetExceeded`] when
    /// there is no room left for the final range. Forwards any errors from the
    /// I2C bus.
    pub fn set_measurement_timing_budget(&mut self, budget_us: u32) -> Result<(), Error<EI2C>> {
        if budget_us < MIN_TIMING_BUDGET_US {
            warn!("timing budget {} us is below the minimum", budget_us);
            return Err(Error::TimingBudgetTooShort(budget_us));
        }

        let enables = self.get_sequence_step_enables()?;
        let timeouts = self.get_sequence_step_timeouts(enables)?;

        let mut used_budget_us = budget_before_final_range(SET_START_OVERHEAD, enables, &timeouts);

        if enables.final_range {
            used_budget_us += FINAL_RANGE_OVERHEAD;

            // "Note that the final range timeout is determined by the timing
            // budget and the sum of all other timeouts within the sequence.
            // If there is no room for the final range timeout, then an error
            // will be set. Otherwise the remaining time will be applied to
            // the final range."
            if used_budget_us > budget_us {
                warn!(
                    "timing budget {} us leaves no room for the final range ({} us used)",
                    budget_us,
                    used_budget_us
                );
                return Err(Error::TimingBudgetExceeded {
                    budget_us,
                    used_us: used_budget_us,
                });
            }

            let final_range_timeout_us = budget_us - used_budget_us;

            // "For the final range timeout, the pre-range timeout must be
            // added. To do this both final and pre-range timeouts must be
            // expressed in macro periods MClks because they have different
            // vcsel periods."
            let mut final_range_timeout_mclks = timeout_microseconds_to_mclks(
                final_range_timeout_us,
                timeouts.final_range_vcsel_period_pclks,
            );

            if enables.pre_range {
                final_range_timeout_mclks += u32::from(timeouts.pre_range_mclks);
            }

            self.write_u16(
                Register::FinalRangeConfigTimeoutMacropHi,
                encode_timeout(final_range_timeout_mclks),
            )?;
        }

        debug!("timing budget set to {} us", budget_us);
        self.measurement_timing_budget_us = budget_us;
        Ok(())
    }

    /// Get the measurement timing budget in microseconds as currently
    /// programmed in the device.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn get_measurement_timing_budget(&mut self) -> Result<u32, Error<EI2C>> {
        let enables = self.get_sequence_step_enables()?;
        let timeouts = self.get_sequence_step_timeouts(enables)?;

        let mut budget_us = budget_before_final_range(GET_START_OVERHEAD, enables, &timeouts);

        if enables.final_range {
            budget_us += timeouts.final_range_us + FINAL_RANGE_OVERHEAD;
        }

        self.measurement_timing_budget_us = budget_us;
        Ok(budget_us)
    }

    /// The budget last applied or read back, without touching the bus.
    #[must_use]
    pub fn measurement_timing_budget(&self) -> u32 {
        self.measurement_timing_budget_us
    }
}

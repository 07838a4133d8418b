use crate::{
    reg::{sequence_config, Page, PrivateRegister, Register},
    timing::{encode_timeout, encode_vcsel_period, timeout_microseconds_to_mclks},
    ClockSource, Error, Vl53l0x,
};

/// The ranging phase whose VCSEL (vertical cavity surface emitting laser)
/// pulse period is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VcselPeriodType {
    /// Valid periods: 12, 14, 16 and 18 PCLKs (initialised default: 14).
    PreRange,
    /// Valid periods: 8, 10, 12 and 14 PCLKs (initialised default: 10).
    FinalRange,
}

const VALID_PHASE_LOW: u8 = 0x08;

/// "Set phase check limits"
fn pre_range_valid_phase_high(period_pclks: u8) -> Option<u8> {
    match period_pclks {
        12 => Some(0x18),
        14 => Some(0x30),
        16 => Some(0x40),
        18 => Some(0x50),
        _ => None,
    }
}

#[derive(Clone, Copy)]
struct FinalRangePhaseSettings {
    valid_phase_high: u8,
    vcsel_width: u8,
    phasecal_timeout: u8,
    phasecal_lim: u8,
}

fn final_range_phase_settings(period_pclks: u8) -> Option<FinalRangePhaseSettings> {
    let (valid_phase_high, vcsel_width, phasecal_timeout, phasecal_lim) = match period_pclks {
        8 => (0x10, 0x02, 0x0C, 0x30),
        10 => (0x28, 0x03, 0x09, 0x20),
        12 => (0x38, 0x03, 0x08, 0x20),
        14 => (0x48, 0x03, 0x07, 0x20),
        _ => return None,
    };
    Some(FinalRangePhaseSettings {
        valid_phase_high,
        vcsel_width,
        phasecal_timeout,
        phasecal_lim,
    })
}

/// MSRC timeout register value for a timeout in MCLKs, clamped to the 8-bit
/// register.
fn msrc_timeout_register(timeout_mclks: u32) -> u8 {
    if timeout_mclks > 256 {
        255
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let value = timeout_mclks.saturating_sub(1) as u8;
        value
    }
}

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    /// Set the VCSEL pulse period for the given period type. Longer periods
    /// increase the potential range of the sensor. The sequence step timeouts
    /// are carried over to the new period, the timing budget is re-applied and
    /// a phase calibration is run.
    ///
    /// Nothing is rolled back when a step fails part way through.
    ///
    /// # Errors
    /// Fails with [`Error::InvalidVcselPeriod`] before touching the device if
    /// the period is not valid for the type. Otherwise forwards errors from the
    /// I2C bus, from re-applying the timing budget and from the phase
    /// calibration. The phase calibration runs even when re-applying the
    /// budget fails, and the budget error is returned first.
    pub fn set_vcsel_pulse_period(
        &mut self,
        period_type: VcselPeriodType,
        period_pclks: u8,
    ) -> Result<(), Error<EI2C>> {
        let valid = match period_type {
            VcselPeriodType::PreRange => pre_range_valid_phase_high(period_pclks).is_some(),
            VcselPeriodType::FinalRange => final_range_phase_settings(period_pclks).is_some(),
        };
        if !valid {
            warn!("rejected VCSEL period {} pclks", period_pclks);
            return Err(Error::InvalidVcselPeriod(period_type, period_pclks));
        }

        let vcsel_period_reg = encode_vcsel_period(period_pclks);

        // "When the VCSEL period for the pre or final range is changed, the
        // corresponding timeout must be read from the device using the current
        // VCSEL period, then the new VCSEL period can be applied. The timeout
        // then must be written back to the device using the new VCSEL period.
        //
        // For the MSRC timeout, the same applies - this timeout being
        // dependant on the pre-range vcsel period."
        let enables = self.get_sequence_step_enables()?;
        let timeouts = self.get_sequence_step_timeouts(enables)?;

        match period_type {
            VcselPeriodType::PreRange => {
                if let Some(valid_phase_high) = pre_range_valid_phase_high(period_pclks) {
                    self.write(Register::PreRangeConfigValidPhaseHigh, valid_phase_high)?;
                }
                self.write(Register::PreRangeConfigValidPhaseLow, VALID_PHASE_LOW)?;

                self.write(Register::PreRangeConfigVcselPeriod, vcsel_period_reg)?;

                let new_pre_range_timeout_mclks =
                    timeout_microseconds_to_mclks(timeouts.pre_range_us, period_pclks);
                self.write_u16(
                    Register::PreRangeConfigTimeoutMacropHi,
                    encode_timeout(new_pre_range_timeout_mclks),
                )?;

                let new_msrc_timeout_mclks =
                    timeout_microseconds_to_mclks(timeouts.msrc_dss_tcc_us, period_pclks);
                self.write(
                    Register::MsrcConfigTimeoutMacrop,
                    msrc_timeout_register(new_msrc_timeout_mclks),
                )?;
            }
            VcselPeriodType::FinalRange => {
                if let Some(settings) = final_range_phase_settings(period_pclks) {
                    self.write(
                        Register::FinalRangeConfigValidPhaseHigh,
                        settings.valid_phase_high,
                    )?;
                    self.write(Register::FinalRangeConfigValidPhaseLow, VALID_PHASE_LOW)?;
                    self.write(Register::GlobalConfigVcselWidth, settings.vcsel_width)?;
                    self.write(
                        Register::AlgoPhasecalConfigTimeout,
                        settings.phasecal_timeout,
                    )?;
                    self.with_page(Page::Private, |this| {
                        this.write(PrivateRegister::AlgoPhasecalLim, settings.phasecal_lim)
                    })?;
                }

                self.write(Register::FinalRangeConfigVcselPeriod, vcsel_period_reg)?;

                // "For the final range timeout, the pre-range timeout must be
                // added."
                let mut new_final_range_timeout_mclks =
                    timeout_microseconds_to_mclks(timeouts.final_range_us, period_pclks);
                if enables.pre_range {
                    new_final_range_timeout_mclks += u32::from(timeouts.pre_range_mclks);
                }
                self.write_u16(
                    Register::FinalRangeConfigTimeoutMacropHi,
                    encode_timeout(new_final_range_timeout_mclks),
                )?;
            }
        }

        // "Finally, the timing budget must be re-applied"
        let budget = self.set_measurement_timing_budget(self.measurement_timing_budget_us);

        // "Perform the phase calibration. This is needed after changing on
        // vcsel period."
        let calibration = self.perform_phase_calibration();
        budget.and(calibration)?;

        debug!("VCSEL period set to {} pclks", period_pclks);
        Ok(())
    }

    /// Run a phase calibration with only the phase step enabled, then restore
    /// the previous sequence config.
    pub(crate) fn perform_phase_calibration(&mut self) -> Result<(), Error<EI2C>> {
        let sequence_config = self.read(Register::SystemSequenceConfig)?;
        self.write(
            Register::SystemSequenceConfig,
            sequence_config::PHASE_CALIBRATION,
        )?;
        let calibration = self.perform_single_ref_calibration(0x00);
        self.write(Register::SystemSequenceConfig, sequence_config)?;
        calibration
    }
}

use crate::{
    reg::Register,
    timing::{decode_timeout, decode_vcsel_period, timeout_mclks_to_microseconds},
    vcsel::VcselPeriodType,
    ClockSource, Error, Vl53l0x,
};

/// Which steps of the ranging sequence are enabled.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceStepEnables {
    /// Target centre check.
    pub tcc: bool,
    /// Minimum signal rate check.
    pub msrc: bool,
    /// Dynamic SPAD selection.
    pub dss: bool,
    pub pre_range: bool,
    pub final_range: bool,
}

impl SequenceStepEnables {
    pub(crate) fn from_config(sequence_config: u8) -> Self {
        Self {
            tcc: ((sequence_config >> 4) & 0x1) != 0,
            dss: ((sequence_config >> 3) & 0x1) != 0,
            msrc: ((sequence_config >> 2) & 0x1) != 0,
            pre_range: ((sequence_config >> 6) & 0x1) != 0,
            final_range: ((sequence_config >> 7) & 0x1) != 0,
        }
    }
}

/// Timeouts of the sequence steps as currently programmed. MSRC, DSS and TCC
/// share one timeout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceStepTimeouts {
    pub pre_range_vcsel_period_pclks: u8,
    pub final_range_vcsel_period_pclks: u8,
    pub msrc_dss_tcc_mclks: u16,
    pub pre_range_mclks: u16,
    /// Final range only, the pre-range part is already taken out.
    pub final_range_mclks: u16,
    pub msrc_dss_tcc_us: u32,
    pub pre_range_us: u32,
    pub final_range_us: u32,
}

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    /// Read which sequence steps are enabled.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn sequence_step_enables(&mut self) -> Result<SequenceStepEnables, Error<EI2C>> {
        self.get_sequence_step_enables()
    }

    /// Read the timeouts of every sequence step.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn sequence_step_timeouts(&mut self) -> Result<SequenceStepTimeouts, Error<EI2C>> {
        let enables = self.get_sequence_step_enables()?;
        self.get_sequence_step_timeouts(enables)
    }

    /// Get the VCSEL pulse period in PCLKs for the given period type.
    ///
    /// # Errors
    /// Forwards any errors from the I2C bus.
    pub fn get_vcsel_pulse_period(
        &mut self,
        period_type: VcselPeriodType,
    ) -> Result<u8, Error<EI2C>> {
        let register = match period_type {
            VcselPeriodType::PreRange => Register::PreRangeConfigVcselPeriod,
            VcselPeriodType::FinalRange => Register::FinalRangeConfigVcselPeriod,
        };
        Ok(decode_vcsel_period(self.read(register)?))
    }

    pub(crate) fn get_sequence_step_enables(
        &mut self,
    ) -> Result<SequenceStepEnables, Error<EI2C>> {
        let sequence_config = self.read(Register::SystemSequenceConfig)?;
        Ok(SequenceStepEnables::from_config(sequence_config))
    }

    // The final range timeout register holds pre-range + final range when the
    // pre-range step is enabled, so the pre-range timeout must be read first.
    pub(crate) fn get_sequence_step_timeouts(
        &mut self,
        enables: SequenceStepEnables,
    ) -> Result<SequenceStepTimeouts, Error<EI2C>> {
        let mut timeouts = SequenceStepTimeouts {
            pre_range_vcsel_period_pclks: self.get_vcsel_pulse_period(VcselPeriodType::PreRange)?,
            ..SequenceStepTimeouts::default()
        };

        timeouts.msrc_dss_tcc_mclks = u16::from(self.read(Register::MsrcConfigTimeoutMacrop)?) + 1;
        timeouts.msrc_dss_tcc_us = timeout_mclks_to_microseconds(
            timeouts.msrc_dss_tcc_mclks,
            timeouts.pre_range_vcsel_period_pclks,
        );

        timeouts.pre_range_mclks =
            decode_timeout(self.read_u16(Register::PreRangeConfigTimeoutMacropHi)?);
        timeouts.pre_range_us = timeout_mclks_to_microseconds(
            timeouts.pre_range_mclks,
            timeouts.pre_range_vcsel_period_pclks,
        );

        timeouts.final_range_vcsel_period_pclks =
            self.get_vcsel_pulse_period(VcselPeriodType::FinalRange)?;

        timeouts.final_range_mclks =
            decode_timeout(self.read_u16(Register::FinalRangeConfigTimeoutMacropHi)?);

        if enables.pre_range {
            timeouts.final_range_mclks = timeouts
                .final_range_mclks
                .saturating_sub(timeouts.pre_range_mclks);
        }

        timeouts.final_range_us = timeout_mclks_to_microseconds(
            timeouts.final_range_mclks,
            timeouts.final_range_vcsel_period_pclks,
        );

        Ok(timeouts)
    }
}

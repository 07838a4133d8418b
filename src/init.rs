use crate::{
    reg::{sequence_config, sysrange, Page, PrivateRegister, Register},
    tuning::DEFAULT_TUNING_SETTINGS,
    ClockSource, Error, Vl53l0x,
};

/// First reference SPAD of the aperture type.
const FIRST_APERTURE_SPAD: u8 = 12;
const REF_SPAD_MAP_BITS: u8 = 48;

/// Keep at most `spad_count` SPADs enabled in the reference map, starting
/// from `first_spad_to_enable`. Bits are visited once from 0 to 47; every bit
/// below the start and every set bit after the count has been reached is
/// cleared.
pub(crate) fn adjust_spad_map(ref_spad_map: &mut [u8; 6], first_spad_to_enable: u8, spad_count: u8) {
    let mut spads_enabled: u8 = 0;

    for i in 0..REF_SPAD_MAP_BITS {
        let byte = usize::from(i / 8);
        let bit = i % 8;

        if i < first_spad_to_enable || spads_enabled == spad_count {
            ref_spad_map[byte] &= !(1 << bit);
        } else if (ref_spad_map[byte] >> bit) & 0x1 != 0 {
            spads_enabled += 1;
        }
    }
}

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    /// Initialise the sensor: IO voltage, default tuning, reference SPADs,
    /// interrupt configuration, timing budget and the VHV and phase reference
    /// calibrations. Reference SPAD management itself is not run, the
    /// factory values in NVM are used.
    ///
    /// # Errors
    /// Fails with [`Error::Timeout`] if reading the SPAD info or either
    /// calibration does not finish within the IO timeout, and with
    /// [`Error::InvalidSignalRateLimit`] for a bad [`Config`](crate::Config)
    /// limit. Forwards any errors from the I2C bus.
    pub fn init(&mut self) -> Result<(), Error<EI2C>> {
        info!("initialising VL53L0X at address {}", self.address);

        // The sensor uses 1V8 mode for I/O by default.
        if self.io_2v8 {
            debug!("init: 2V8 IO mode");
            self.update(Register::VhvConfigPadSclSdaExtsupHv, |data| *data |= 0x01)?;
        }

        // "Set I2C standard mode"
        self.write(Register::I2cMode, 0x00)?;

        debug!("init: reading stop variable");
        self.stop_variable = self.with_power_forced(|this| {
            this.with_private_page(|this| this.read(PrivateRegister::StopVariable))
        })?;

        // disable SIGNAL_RATE_MSRC (bit 1) and SIGNAL_RATE_PRE_RANGE (bit 4)
        // limit checks
        self.update(Register::MsrcConfigControl, |data| *data |= 0x12)?;
        self.set_signal_rate_limit(self.signal_rate_limit_mcps)?;

        self.write(Register::SystemSequenceConfig, sequence_config::ALL)?;

        debug!("init: reading SPAD info");
        let (spad_count, spad_type_is_aperture) = self.get_spad_info()?;
        self.set_reference_spads(spad_count, spad_type_is_aperture)?;

        debug!("init: loading tuning settings");
        for &(register, value) in &DEFAULT_TUNING_SETTINGS {
            self.write(register, value)?;
        }

        // "Set interrupt config to new sample ready"
        self.write(Register::SystemInterruptConfigGpio, 0x04)?;
        self.update(Register::GpioHvMuxActiveHigh, |data| *data &= !0x10)?; // active low
        self.write(Register::SystemInterruptClear, 0x01)?;

        self.measurement_timing_budget_us = self.get_measurement_timing_budget()?;

        // "Disable MSRC and TCC by default"
        self.write(Register::SystemSequenceConfig, sequence_config::DEFAULT)?;

        // "Recalculate timing budget"
        self.set_measurement_timing_budget(self.measurement_timing_budget_us)?;

        debug!("init: VHV calibration");
        self.write(
            Register::SystemSequenceConfig,
            sequence_config::VHV_CALIBRATION,
        )?;
        self.perform_single_ref_calibration(0x40)?;

        debug!("init: phase calibration");
        self.write(
            Register::SystemSequenceConfig,
            sequence_config::PHASE_CALIBRATION,
        )?;
        self.perform_single_ref_calibration(0x00)?;

        // "restore the previous Sequence Config"
        self.write(Register::SystemSequenceConfig, sequence_config::DEFAULT)?;

        info!(
            "VL53L0X ready, timing budget {} us",
            self.measurement_timing_budget_us
        );
        Ok(())
    }

    /// Get the reference SPAD count and whether they are of the aperture
    /// type, from NVM.
    fn get_spad_info(&mut self) -> Result<(u8, bool), Error<EI2C>> {
        let info = self.with_power_forced(|this| {
            this.with_private_page(|this| {
                this.select_page(Page::NvmSetup)?;
                this.update(PrivateRegister::NvmStrobe, |data| *data |= 0x04)?;
                this.select_page(Page::NvmRead)?;
                this.write(PrivateRegister::NvmReadControl, 0x01)?;

                this.write(Register::PowerManagementGo1PowerForce, 0x01)?;

                this.write(PrivateRegister::NvmReadAddress, 0x6B)?;
                this.write(PrivateRegister::NvmStrobe, 0x00)?;
                this.poll_until(|this| Ok(this.read(PrivateRegister::NvmStrobe)? != 0x00))?;
                this.write(PrivateRegister::NvmStrobe, 0x01)?;
                let info = this.read(PrivateRegister::NvmSpadInfo)?;

                this.write(PrivateRegister::NvmReadControl, 0x00)?;
                this.select_page(Page::NvmSetup)?;
                this.update(PrivateRegister::NvmStrobe, |data| *data &= !0x04)?;
                Ok(info)
            })
        })?;

        let count = info & 0x7F;
        let type_is_aperture = ((info >> 7) & 0x01) != 0;
        debug!("reference SPADs: {} (aperture: {})", count, type_is_aperture);
        Ok((count, type_is_aperture))
    }

    /// Enable the reference SPADs found in NVM, assuming the NVM values are
    /// valid.
    fn set_reference_spads(
        &mut self,
        spad_count: u8,
        spad_type_is_aperture: bool,
    ) -> Result<(), Error<EI2C>> {
        // The SPAD map (RefGoodSpadMap) is more easily read from
        // GLOBAL_CONFIG_SPAD_ENABLES_REF_0 through _5 than from NVM.
        let mut ref_spad_map = [0; 6];
        self.read_many(Register::GlobalConfigSpadEnablesRef0, &mut ref_spad_map)?;

        self.with_page(Page::Private, |this| {
            this.write(PrivateRegister::DynamicSpadRefEnStartOffset, 0x00)?;
            this.write(PrivateRegister::DynamicSpadNumRequestedRefSpad, 0x2C)
        })?;
        self.write(Register::GlobalConfigRefEnStartSelect, 0xB4)?;

        let first_spad_to_enable = if spad_type_is_aperture {
            FIRST_APERTURE_SPAD
        } else {
            0
        };
        adjust_spad_map(&mut ref_spad_map, first_spad_to_enable, spad_count);

        self.write_many(Register::GlobalConfigSpadEnablesRef0, &ref_spad_map)
    }

    pub(crate) fn perform_single_ref_calibration(
        &mut self,
        vhv_init_byte: u8,
    ) -> Result<(), Error<EI2C>> {
        self.write(Register::SysrangeStart, sysrange::START_STOP | vhv_init_byte)?;

        self.poll_until(|this| Ok(this.read(Register::ResultInterruptStatus)? & 0x07 != 0))?;

        self.write(Register::SystemInterruptClear, 0x01)?;
        self.write(Register::SysrangeStart, sysrange::STOP)
    }
}

#[cfg(test)]
mod tests {
    use super::adjust_spad_map;
    use crate::testing::{init_sequence, read, spad_info_prefix, write, InitOptions, TickClock};
    use crate::{Config, Error, Vl53l0x};
    use embedded_hal_mock::eh1::i2c::Mock as I2cMock;

    fn enabled_bits(map: &[u8; 6]) -> Vec<u8> {
        (0..48_u8)
            .filter(|&i| (map[usize::from(i / 8)] >> (i % 8)) & 1 != 0)
            .collect()
    }

    #[test]
    fn aperture_spads_start_at_twelve_and_stop_at_count() {
        let mut map = [0xFF; 6];
        adjust_spad_map(&mut map, 12, 5);
        assert_eq!(enabled_bits(&map), vec![12, 13, 14, 15, 16]);
    }

    #[test]
    fn only_set_bits_count_towards_the_limit() {
        let mut map = [0b1010_1010, 0, 0, 0, 0, 0xFF];
        adjust_spad_map(&mut map, 0, 3);
        assert_eq!(enabled_bits(&map), vec![1, 3, 5]);
    }

    #[test]
    fn bits_before_the_start_are_cleared_even_below_count() {
        let mut map = [0xFF, 0x0F, 0, 0, 0, 0];
        adjust_spad_map(&mut map, 12, 44);
        assert!(enabled_bits(&map).is_empty());
    }

    #[test]
    fn init_runs_the_full_sequence() {
        let options = InitOptions::default();
        let mut i2c = I2cMock::new(&init_sequence(&options));
        let mut dev = Vl53l0x::new(i2c.clone(), TickClock::default(), Config::default());

        dev.init().unwrap();
        assert_eq!(dev.stop_variable, options.stop_variable);
        assert_eq!(dev.measurement_timing_budget(), 33_971);
        assert_eq!(dev.page, 0x00);
        assert!(!dev.timeout_occurred());

        i2c.done();
    }

    #[test]
    fn init_in_1v8_mode_leaves_the_pad_config_alone() {
        let options = InitOptions {
            io_2v8: false,
            ..InitOptions::default()
        };
        let mut i2c = I2cMock::new(&init_sequence(&options));
        let mut dev = Vl53l0x::new(
            i2c.clone(),
            TickClock::default(),
            Config::default().io_2v8(false),
        );

        dev.init().unwrap();

        i2c.done();
    }

    #[test]
    fn init_fails_when_spad_info_never_arrives() {
        let mut expectations = spad_info_prefix(&InitOptions::default());
        // io timeout of 1 ms allows two polls
        expectations.extend([read(0x83, &[0x00]), read(0x83, &[0x00])]);
        // unwinding restores the private page, then the default page
        expectations.extend([
            write(0xFF, &[0x01]),
            write(0x00, &[0x01]),
            write(0xFF, &[0x00]),
            write(0x80, &[0x00]),
        ]);

        let mut i2c = I2cMock::new(&expectations);
        let mut dev = Vl53l0x::new(
            i2c.clone(),
            TickClock::default(),
            Config::default().io_timeout_ms(1),
        );

        assert!(matches!(dev.init(), Err(Error::Timeout)));
        assert_eq!(dev.page, 0x00);

        i2c.done();
    }
}

use crate::{
    reg::{Page, PrivateRegister, Register},
    ClockSource, Error, Vl53l0x,
};

impl<I2C, C, EI2C> Vl53l0x<I2C, C>
where
    I2C: embedded_hal::i2c::I2c<Error = EI2C>,
    C: ClockSource,
{
    pub(crate) fn write(&mut self, register: impl Into<u8>, data: u8) -> Result<(), Error<EI2C>> {
        let register = register.into();
        self.i2c.write(self.address, &[register, data])?;
        if register == Register::PageSelect as u8 {
            self.page = data;
        }
        Ok(())
    }

    pub(crate) fn write_u16(
        &mut self,
        register: impl Into<u8>,
        data: u16,
    ) -> Result<(), Error<EI2C>> {
        let [hi, lo] = data.to_be_bytes();
        self.i2c.write(self.address, &[register.into(), hi, lo])?;
        Ok(())
    }

    pub(crate) fn write_u32(
        &mut self,
        register: impl Into<u8>,
        data: u32,
    ) -> Result<(), Error<EI2C>> {
        let [b0, b1, b2, b3] = data.to_be_bytes();
        self.i2c
            .write(self.address, &[register.into(), b0, b1, b2, b3])?;
        Ok(())
    }

    pub(crate) fn write_many(
        &mut self,
        register: impl Into<u8>,
        data: &[u8],
    ) -> Result<(), Error<EI2C>> {
        self.i2c.transaction(
            self.address,
            &mut [
                embedded_hal::i2c::Operation::Write(&[register.into()]),
                embedded_hal::i2c::Operation::Write(data),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn read(&mut self, register: impl Into<u8>) -> Result<u8, Error<EI2C>> {
        let mut data = [0];
        self.i2c
            .write_read(self.address, &[register.into()], &mut data)?;
        Ok(data[0])
    }

    pub(crate) fn read_u16(&mut self, register: impl Into<u8>) -> Result<u16, Error<EI2C>> {
        let mut data = [0; 2];
        self.i2c
            .write_read(self.address, &[register.into()], &mut data)?;
        Ok(u16::from_be_bytes(data))
    }

    #[cfg(test)]
    pub(crate) fn read_u32(&mut self, register: impl Into<u8>) -> Result<u32, Error<EI2C>> {
        let mut data = [0; 4];
        self.i2c
            .write_read(self.address, &[register.into()], &mut data)?;
        Ok(u32::from_be_bytes(data))
    }

    pub(crate) fn read_many(
        &mut self,
        register: impl Into<u8>,
        data: &mut [u8],
    ) -> Result<(), Error<EI2C>> {
        self.i2c.write_read(self.address, &[register.into()], data)?;
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        register: impl Into<u8>,
        f: impl FnOnce(&mut u8),
    ) -> Result<(), Error<EI2C>> {
        let register = register.into();
        let mut data = self.read(register)?;
        f(&mut data);
        self.write(register, data)
    }

    /// Select a register page. Nothing is written if it is already selected.
    pub(crate) fn select_page(&mut self, page: Page) -> Result<(), Error<EI2C>> {
        if self.page == page as u8 {
            return Ok(());
        }
        self.write(Register::PageSelect, page as u8)
    }

    /// Run `f` with `page` selected. The default page is selected again
    /// afterwards, also when `f` fails.
    pub(crate) fn with_page<T>(
        &mut self,
        page: Page,
        f: impl FnOnce(&mut Self) -> Result<T, Error<EI2C>>,
    ) -> Result<T, Error<EI2C>> {
        self.select_page(page)?;
        let result = f(self);
        self.select_page(Page::Default)?;
        result
    }

    /// Run `f` with the private page open for internal register access.
    /// `f` may switch to other pages; the exit sequence always goes back
    /// through the private page to the default page.
    pub(crate) fn with_private_page<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Error<EI2C>>,
    ) -> Result<T, Error<EI2C>> {
        self.with_page(Page::Private, |this| {
            this.write(PrivateRegister::InternalTuning, 0x00)?;
            let result = f(this);
            this.select_page(Page::Private)?;
            this.write(PrivateRegister::InternalTuning, 0x01)?;
            result
        })
    }

    /// Run `f` with the power force bit set.
    pub(crate) fn with_power_forced<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Error<EI2C>>,
    ) -> Result<T, Error<EI2C>> {
        self.write(Register::PowerManagementGo1PowerForce, 0x01)?;
        let result = f(self);
        self.write(Register::PowerManagementGo1PowerForce, 0x00)?;
        result
    }

    /// Re-write the stop variable captured during initialisation. Every
    /// ranging start goes through here.
    pub(crate) fn restore_stop_variable(&mut self) -> Result<(), Error<EI2C>> {
        let stop_variable = self.stop_variable;
        self.with_power_forced(|this| {
            this.with_private_page(|this| this.write(PrivateRegister::StopVariable, stop_variable))
        })
    }

    /// Poll `ready` until it returns true. Gives up with [`Error::Timeout`]
    /// and sets the sticky timeout flag once more than the IO timeout has
    /// passed.
    pub(crate) fn poll_until(
        &mut self,
        mut ready: impl FnMut(&mut Self) -> Result<bool, Error<EI2C>>,
    ) -> Result<(), Error<EI2C>> {
        let start_ms = self.clock.get_ms();
        loop {
            if ready(self)? {
                return Ok(());
            }

            if self.io_timeout_ms > 0
                && self.clock.get_ms().wrapping_sub(start_ms) > self.io_timeout_ms
            {
                warn!("device busy for more than {} ms", self.io_timeout_ms);
                self.did_timeout = true;
                return Err(Error::Timeout);
            }
        }
    }
}

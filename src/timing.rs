//! Conversions between the device's clock units.
//!
//! Timeouts are programmed in MCLKs (macro periods), whose length depends on
//! the VCSEL pulse period of the step. The PLL period (1655 ps) and macro
//! period length (2304 VCSEL clocks) are fixed by the silicon.

/// Macro period in nanoseconds for the given VCSEL period in PCLKs.
pub(crate) fn calc_macro_period(vcsel_period_pclks: u8) -> u32 {
    ((2304 * u32::from(vcsel_period_pclks) * 1655) + 500) / 1000
}

pub(crate) fn timeout_mclks_to_microseconds(timeout_period_mclks: u16, vcsel_period_pclks: u8) -> u32 {
    let macro_period_ns = u64::from(calc_macro_period(vcsel_period_pclks));

    let us = ((u64::from(timeout_period_mclks) * macro_period_ns) + (macro_period_ns / 2)) / 1000;
    u32::try_from(us).unwrap_or(u32::MAX)
}

/// Zero for a zero VCSEL period, which only a corrupt register can produce.
pub(crate) fn timeout_microseconds_to_mclks(timeout_period_us: u32, vcsel_period_pclks: u8) -> u32 {
    let macro_period_ns = u64::from(calc_macro_period(vcsel_period_pclks));
    if macro_period_ns == 0 {
        return 0;
    }

    let mclks = ((u64::from(timeout_period_us) * 1000) + (macro_period_ns / 2)) / macro_period_ns;
    u32::try_from(mclks).unwrap_or(u32::MAX)
}

/// Encode a timeout as `(LSByte * 2^MSByte) + 1`. Timeouts longer than
/// `u16::MAX` MCLKs are clamped.
pub(crate) fn encode_timeout(timeout_mclks: u32) -> u16 {
    if timeout_mclks == 0 {
        return 0;
    }

    let mut ls_byte = timeout_mclks.min(u32::from(u16::MAX)) - 1;
    let mut ms_byte: u16 = 0;

    while (ls_byte & 0xFFFF_FF00) > 0 {
        ls_byte >>= 1;
        ms_byte += 1;
    }

    #[allow(clippy::cast_possible_truncation)]
    let ls_byte = (ls_byte & 0xFF) as u16;
    (ms_byte << 8) | ls_byte
}

pub(crate) fn decode_timeout(reg_val: u16) -> u16 {
    let [ms_byte, ls_byte] = reg_val.to_be_bytes();
    let mclks = u32::from(ls_byte)
        .checked_shl(u32::from(ms_byte))
        .unwrap_or(0);

    #[allow(clippy::cast_possible_truncation)]
    (mclks as u16).wrapping_add(1)
}

pub(crate) fn encode_vcsel_period(period_pclks: u8) -> u8 {
    (period_pclks >> 1) - 1
}

pub(crate) fn decode_vcsel_period(reg_val: u8) -> u8 {
    reg_val.wrapping_add(1) << 1
}

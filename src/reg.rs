//! Register map of the VL53L0X.
//!
//! Most registers live on the default page. A handful of private registers
//! are only reachable after selecting another page through
//! [`Register::PageSelect`], so they are kept in [`PrivateRegister`] and must
//! only be accessed inside the page helpers in `bus.rs`.

/// Registers on the default page.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Register {
    SysrangeStart = 0x00,
    SystemSequenceConfig = 0x01,
    SystemIntermeasurementPeriod = 0x04,
    SystemInterruptConfigGpio = 0x0A,
    SystemInterruptClear = 0x0B,
    ResultInterruptStatus = 0x13,
    ResultRangeStatus = 0x14,
    AlgoPhasecalConfigTimeout = 0x30,
    GlobalConfigVcselWidth = 0x32,
    FinalRangeConfigMinCountRateRtnLimit = 0x44,
    MsrcConfigTimeoutMacrop = 0x46,
    FinalRangeConfigValidPhaseLow = 0x47,
    FinalRangeConfigValidPhaseHigh = 0x48,
    PreRangeConfigVcselPeriod = 0x50,
    PreRangeConfigTimeoutMacropHi = 0x51,
    PreRangeConfigValidPhaseLow = 0x56,
    PreRangeConfigValidPhaseHigh = 0x57,
    MsrcConfigControl = 0x60,
    FinalRangeConfigVcselPeriod = 0x70,
    FinalRangeConfigTimeoutMacropHi = 0x71,
    PowerManagementGo1PowerForce = 0x80,
    GpioHvMuxActiveHigh = 0x84,
    I2cMode = 0x88,
    VhvConfigPadSclSdaExtsupHv = 0x89,
    I2cSlaveDeviceAddress = 0x8A,
    GlobalConfigSpadEnablesRef0 = 0xB0,
    GlobalConfigRefEnStartSelect = 0xB6,
    IdentificationModelId = 0xC0,
    IdentificationRevisionId = 0xC2,
    OscCalibrateVal = 0xF8,
    PageSelect = 0xFF,
}

impl From<Register> for u8 {
    fn from(r: Register) -> Self {
        r as u8
    }
}

/// Registers that are only meaningful while a non-default page is selected.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrivateRegister {
    /// Page 1: cleared while private registers are being accessed.
    InternalTuning = 0x00,
    /// Page 1.
    AlgoPhasecalLim = 0x30,
    /// Page 1.
    DynamicSpadNumRequestedRefSpad = 0x4E,
    /// Page 1.
    DynamicSpadRefEnStartOffset = 0x4F,
    /// Page 7.
    NvmReadControl = 0x81,
    /// Page 6 and 7: NVM strobe, polled until non-zero.
    NvmStrobe = 0x83,
    /// Page 1.
    StopVariable = 0x91,
    /// Page 7: reference SPAD count (bits 0..7) and type (bit 7).
    NvmSpadInfo = 0x92,
    /// Page 7.
    NvmReadAddress = 0x94,
}

impl From<PrivateRegister> for u8 {
    fn from(r: PrivateRegister) -> Self {
        r as u8
    }
}

/// Values written to [`Register::PageSelect`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Page {
    Default = 0x00,
    Private = 0x01,
    NvmSetup = 0x06,
    NvmRead = 0x07,
}

/// `SYSRANGE_START` commands.
pub(crate) mod sysrange {
    pub const STOP: u8 = 0x00;
    pub const START_STOP: u8 = 0x01;
    pub const BACK_TO_BACK: u8 = 0x02;
    pub const TIMED: u8 = 0x04;
}

/// `SYSTEM_SEQUENCE_CONFIG` values used during calibration.
pub(crate) mod sequence_config {
    /// Every step enabled.
    pub const ALL: u8 = 0xFF;
    /// Final range, pre-range and DSS; MSRC and TCC disabled.
    pub const DEFAULT: u8 = 0xE8;
    pub const VHV_CALIBRATION: u8 = 0x01;
    pub const PHASE_CALIBRATION: u8 = 0x02;
}

/// Offset of the 16-bit range value inside the result block.
pub(crate) const RESULT_RANGE_OFFSET: u8 = 10;

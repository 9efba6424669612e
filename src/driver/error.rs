//! Error types for the UART DMA transport
//!
//! Errors are organized by the operation that produces them:
//! - [`ConfigError`]: channel initialization failures
//! - [`DeinitError`]: channel teardown failures
//! - [`ResizeError`]: buffer resize rejections
//! - [`IoError`]: runtime read/write/flush/formatted I/O failures
//! - [`RegistryError`]: channel registration failures
//! - [`HwError`]: failures reported by a [`UartHardware`](crate::hal::UartHardware) backend
//!
//! The unified [`Error`] enum wraps all domain errors.

// =============================================================================
// Initialization Errors
// =============================================================================

/// Channel initialization errors
///
/// Each variant is a distinct init status; none of them leaves the channel
/// half-initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The port is already initialized (hardware already enabled)
    AlreadyInitialized,
    /// Register-level port initialization failed
    HardwareInitFailed,
    /// RX or TX DMA channel setup failed
    DmaInitFailed,
    /// Staging buffer, ring or scratch allocation failed
    OutOfMemory,
    /// Configuration rejected by validation (zero size, non power-of-two ring, zero baud)
    InvalidConfig,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::AlreadyInitialized => "already initialized",
            ConfigError::HardwareInitFailed => "UART hardware init failed",
            ConfigError::DmaInitFailed => "DMA init failed",
            ConfigError::OutOfMemory => "out of memory",
            ConfigError::InvalidConfig => "invalid configuration",
        }
    }
}

// =============================================================================
// Deinitialization Errors
// =============================================================================

/// Channel deinitialization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeinitError {
    /// The port was never initialized
    NotInitialized,
    /// Register-level port deinitialization failed
    Failed,
    /// DMA channel teardown failed
    DmaFailed,
}

impl core::fmt::Display for DeinitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeinitError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeinitError::NotInitialized => "not initialized",
            DeinitError::Failed => "UART hardware deinit failed",
            DeinitError::DmaFailed => "DMA deinit failed",
        }
    }
}

// =============================================================================
// Resize Errors
// =============================================================================

/// Buffer resize errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResizeError {
    /// The channel has no DMA for the direction being resized
    DmaNotEnabled,
    /// The channel is initialized; deinit it first
    ChannelBusy,
    /// Zero size, or a ring capacity that is not a power of two
    InvalidSize,
}

impl core::fmt::Display for ResizeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResizeError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResizeError::DmaNotEnabled => "DMA not enabled",
            ResizeError::ChannelBusy => "channel busy",
            ResizeError::InvalidSize => "invalid size",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime I/O errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// A bounded wait (TX complete, RX data, blocking byte) expired
    Timeout,
    /// The channel is not initialized
    NotInitialized,
    /// DMA reception could not be re-armed within the retry bound
    RearmFailed,
    /// The hardware rejected a transfer request
    Hardware,
    /// Formatted input did not match the format string
    Format,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout => "operation timed out",
            IoError::NotInitialized => "channel not initialized",
            IoError::RearmFailed => "RX DMA re-arm failed",
            IoError::Hardware => "hardware rejected transfer",
            IoError::Format => "input does not match format",
        }
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Channel registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Every registry slot is occupied
    Full,
    /// The port already has a channel
    Duplicate,
    /// The channel configuration failed validation
    InvalidConfig,
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RegistryError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RegistryError::Full => "registry full",
            RegistryError::Duplicate => "port already registered",
            RegistryError::InvalidConfig => "invalid channel configuration",
        }
    }
}

// =============================================================================
// Hardware Errors
// =============================================================================

/// Errors reported by a hardware backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwError {
    /// Peripheral or DMA channel is busy with another transfer
    Busy,
    /// Register programming failed or read back unexpected state
    Fault,
    /// The port has no DMA channel for this direction
    Unsupported,
}

impl core::fmt::Display for HwError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HwError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HwError::Busy => "hardware busy",
            HwError::Fault => "hardware fault",
            HwError::Unsupported => "not supported by this port",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::OutOfMemory)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Initialization error
    Config(ConfigError),
    /// Deinitialization error
    Deinit(DeinitError),
    /// Resize error
    Resize(ResizeError),
    /// I/O error
    Io(IoError),
    /// Registry error
    Registry(RegistryError),
    /// Hardware backend error
    Hw(HwError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "init: {}", e.as_str()),
            Error::Deinit(e) => write!(f, "deinit: {}", e.as_str()),
            Error::Resize(e) => write!(f, "resize: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
            Error::Registry(e) => write!(f, "registry: {}", e.as_str()),
            Error::Hw(e) => write!(f, "hw: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DeinitError> for Error {
    fn from(e: DeinitError) -> Self {
        Error::Deinit(e)
    }
}

impl From<ResizeError> for Error {
    fn from(e: ResizeError) -> Self {
        Error::Resize(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        Error::Hw(e)
    }
}

/// Result type alias for transport operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for initialization
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for runtime I/O
pub type IoResult<T> = core::result::Result<T, IoError>;

/// Result type alias for hardware backends
pub type HwResult<T = ()> = core::result::Result<T, HwError>;

// =============================================================================
// Unit Tests
// =============================================================================

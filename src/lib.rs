//! This is a platform-agnostic Rust driver for the Si7021 I²C humidity and temperature sensor
//! using the [`embedded-hal`] or [`embedded-hal-async`] traits.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal
//! [`embedded-hal-async`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal-async
//!
//! This driver allows you to:
//! - Measure relative humidity and temperature (no hold master mode).
//! - Read the temperature captured by the last humidity measurement.
//! - Verify the checksum of each measurement.
//! - Trigger a software reset and check the post-reset configuration.
//! - Read and write the user register, including measurement resolution.
//! - Enable/disable the heater and set its drive level.
//! - Read the electronic serial number and firmware revision.
//! - blocking API support.
//! - async API support.
//!
//! The device-info, heater and checksum support are chosen at construction through
//! [`Capabilities`]. Disabled operations return [`Error::Unsupported`] without touching the bus.
//!
//! A checksum mismatch is not an error: the converted value is still returned and
//! `last_measurement_valid()` reports `false` until the next good measurement.
//!
//! ## Features
//!
//! - `async`: Enables async API ([`Si7021Async`]).
//! - `blocking`: Enables blocking API ([`Si7021`]).
//! - `defmt`: Enables logging using the `defmt` framework.
//! - `log`: Enables logging using the `log` framework.
//!
//! ## Supported devices: Si7021 (and the register-compatible Si7013/Si7020)
//!
//! Datasheet:
//!   [Si7021-A20](https://www.silabs.com/documents/public/data-sheets/Si7021-A20.pdf)
//!
//! To use this driver, import this crate and an `embedded_hal` or `embedded_hal_async`
//! implementation, then instantiate the device.
//!
//! ## Blocking Example:
//!
//! ```ignore
//! use si7021::Si7021;
//!
//! // Platform-specific
//! let i2c = /* embedded_hal::i2c::I2c instance */;
//! let delay = /* embedded_hal::delay::DelayNs instance */;
//!
//! let mut si7021 = Si7021::new(i2c, delay);
//! si7021.begin().unwrap();
//!
//! let info = si7021.read_device_info().unwrap();
//! println!("serial {}, firmware {}", info.serial, info.firmware_revision);
//!
//! loop {
//!     let measurement = si7021.measure().unwrap();
//!     println!("{:0.1} %RH, {:0.1} °C (valid: {})",
//!         measurement.humidity_percent,
//!         measurement.centigrade,
//!         si7021.last_measurement_valid());
//! }
//! ```
//!
//! ## Async Example:
//!
//! ```ignore
//! use si7021::{Capabilities, Si7021Async};
//!
//! // Platform-specific
//! let i2c = /* embedded_hal_async::i2c::I2c instance */;
//! let delay = /* embedded_hal_async::delay::DelayNs instance */;
//!
//! let mut si7021 = Si7021Async::with_capabilities(i2c, delay, Capabilities::minimal());
//! si7021.begin().await.unwrap();
//! println!("{:0.1} °C", si7021.read_temperature().await.unwrap());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(not(any(feature = "async", feature = "blocking")))]
compile_error!("At least one of \"async\" and \"blocking\" features must be enabled");

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features \"defmt\" and \"log\" are mutually exclusive and cannot be enabled together");

#[macro_use]
mod fmt;
mod hw_def;
mod types;

#[cfg(feature = "blocking")]
mod device_impl;
#[cfg(feature = "async")]
mod device_impl_async;

pub use crate::{hw_def::*, types::*};

//! Typed property access for input devices managed by the X server's XInput
//! extension. Each call opens its own display connection, resolves the
//! property name to an atom, performs one get or set round-trip, and closes
//! the connection again.

use thiserror::Error;

pub mod backend;
pub mod config;
mod prop;
pub mod value;
pub mod x11;

pub use backend::{Backend, BackendConn, BackendError, DeviceId, Fetched, FetchedItems};
pub use config::Config;
pub use prop::DeviceProps;
pub use value::PropertyValue;

/// Our most common result type. Accessor calls either succeed or fail with
/// exactly one [`Error`]; there are no retries and no partial results.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong during a property access. Each variant
/// carries the device and property it concerns, so a failure is diagnosable
/// from the error value alone.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// The caller passed an empty name, an empty payload, or a zero item
    /// count. Detected before any connection is opened.
    #[error("invalid argument for device {device}: {reason}")]
    InvalidArgument { device: DeviceId, reason: String },
    /// The X server could not be reached, or an open connection broke.
    #[error("cannot connect to the X server: {0}")]
    ConnectionFailed(String),
    /// The property name is not registered with the server.
    #[error("no property `{property}' on device {device}")]
    UnknownProperty { device: DeviceId, property: String },
    /// The server's FLOAT type atom could not be resolved.
    #[error("cannot resolve the FLOAT type atom")]
    UnknownType,
    /// The XIGetProperty request was rejected by the server.
    #[error("fetching `{property}' from device {device} failed: {reason}")]
    FetchFailed {
        device: DeviceId,
        property: String,
        reason: String,
    },
    /// The device returned a different number of items than the caller
    /// declared. The fetched data is discarded.
    #[error("device {device} returned {actual} items for `{property}', expected {expected}")]
    ItemCountMismatch {
        device: DeviceId,
        property: String,
        expected: u32,
        actual: u32,
    },
    /// The XIChangeProperty request was rejected by the server.
    #[error("replacing `{property}' on device {device} failed: {reason}")]
    ReplaceFailed {
        device: DeviceId,
        property: String,
        reason: String,
    },
}

//! Shared platform model and environment marker evaluation for the
//! robotpy-fetch build hook.

pub mod marker;
pub mod platform;

pub use marker::{Marker, MarkerEnvironment, MarkerError};
pub use platform::{ARCH_PLACEHOLDER, OS_PLACEHOLDER, PLATFORMS, Platform, PlatformError};

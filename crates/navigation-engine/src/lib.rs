//! Navigation Engine - browser command execution for the Spectra pipeline
//!
//! This crate owns:
//! - The `BrowserDriver` boundary the pipeline executes against
//! - Driver initialization with backoff and a fallback driver
//! - A bounded driver pool with checkout/checkin semantics
//! - The per-step executor with deadlines, cancellation, and the
//!   `Idle -> Dispatched -> {Completed, Failed, TimedOut}` transition

pub mod driver;
pub mod errors;
pub mod executor;
pub mod pool;
pub mod stub;

pub use driver::{init_driver, BrowserDriver, DriverFactory, ElementHandle};
pub use errors::NavError;
pub use executor::{ObservedState, StepExecutor};
pub use pool::{DriverLease, DriverPool};
pub use stub::{StubDriver, StubDriverFactory, StubPage};

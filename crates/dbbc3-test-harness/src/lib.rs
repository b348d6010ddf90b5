//! dbbc3-test-harness: Test utilities for the DBBC3 workspace.
//!
//! - [`MockTransport`] for deterministic session and command-set tests
//! - [`MockDevice`] for exercising the real TCP transport end to end
//! - [`OctFrameBuilder`] / [`DdcFrameBuilder`] for telemetry payloads

pub mod frames;
pub mod mock_device;
pub mod mock_transport;

pub use frames::{BbcFields, DdcBoardFields, DdcFrameBuilder, IfFields, OctBoardFields, OctFrameBuilder};
pub use mock_device::MockDevice;
pub use mock_transport::{MockTransport, SentLog};

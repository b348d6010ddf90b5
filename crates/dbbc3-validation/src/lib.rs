//! dbbc3-validation: health checks for a running DBBC3.
//!
//! A [`ValidationEngine`] is bound to a connected
//! [`Session`](dbbc3_control::Session) and picks the checks that exist for
//! the device's mode and firmware version. Each check produces one [`Item`];
//! composite checks collect their items into a [`Report`] without stopping
//! at the first failure.
//!
//! ```no_run
//! use dbbc3_control::SessionBuilder;
//! use dbbc3_validation::{ValidationConfig, ValidationEngine};
//!
//! # async fn example() -> dbbc3_core::Result<()> {
//! let session = SessionBuilder::new("192.168.0.60").connect().await?;
//! let engine = ValidationEngine::new(&session, ValidationConfig::default())?;
//! let report = engine.check_system().await?;
//! println!("{report}");
//! if report.exit() {
//!     std::process::exit(1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod config;
pub mod engine;
pub mod report;
pub mod rules;

pub use check::{Check, CheckKind, CheckSet, CheckSetRegistry, Freshness};
pub use config::{Severities, ValidationConfig};
pub use engine::ValidationEngine;
pub use report::{Item, Report, Severity, Status};

//! dbbc3-transport: Transport implementations for DBBC3 control.
//!
//! - [`TcpTransport`] -- the command connection to the control software
//! - [`MulticastSocket`] -- the telemetry broadcast receiver

pub mod tcp;
pub mod udp;

pub use tcp::TcpTransport;
pub use udp::MulticastSocket;

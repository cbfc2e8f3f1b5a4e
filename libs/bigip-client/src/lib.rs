//! BIG-IP Client Library
//!
//! REST client for provisioning application delivery configuration on a
//! BIG-IP appliance: session login, AS3 application declarations, file
//! upload, remote command execution and the certificate issuance pipeline.

pub mod as3;
pub mod certs;
pub mod client;
pub mod command;
pub mod errors;
pub mod session;
pub mod upload;

pub use certs::{CertLifecycle, CertificateAuthority, CertificateRequest, CsrSpec};
pub use client::DeviceClient;
pub use command::CommandResult;
pub use errors::{BigipError, DeleteOutcome};
pub use session::{DeviceConfig, DeviceSession};

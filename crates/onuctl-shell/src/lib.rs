//! Interactive shell sessions against OLT command-line interfaces.
//!
//! [`Session`] implements the read-windowing protocol over any [`Shell`];
//! [`SshConnector`] produces shells over SSH with password authentication.

pub mod error;
pub mod session;
pub mod transport;

pub use error::Error;
pub use session::{Connector, ReadTiming, Session, Shell};
pub use transport::{SshConnector, SshTarget, TransportConfig};

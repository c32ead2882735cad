pub mod control;
pub mod doctor;
pub mod error;
pub mod privilege;
pub mod reader;
pub mod runner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use control::*;
pub use doctor::*;
pub use error::*;
pub use privilege::*;
pub use reader::*;
pub use runner::*;

// Process execution against the iptables tool family

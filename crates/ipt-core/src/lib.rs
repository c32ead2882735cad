pub mod error;
pub mod listing;
pub mod rule;
pub mod settings;
pub mod table;

pub use error::*;
pub use listing::*;
pub use rule::*;
pub use settings::*;
pub use table::*;

// Pure model of iptables listings and command lines; nothing here spawns processes.

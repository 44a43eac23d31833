//! Host adapters for pibot: status probes and power actions for the board
//! the agent runs on.

pub mod power;
pub mod probe;

pub use power::HostPower;
pub use probe::HostProbe;

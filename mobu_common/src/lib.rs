//! Small building blocks shared by the mobu crates.

pub mod state_machine;

pub use state_machine::StateMachine;

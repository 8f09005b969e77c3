// intercut-cli/src/lib.rs
//
// Library portion of the Intercut CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod control;
pub mod logging;
pub mod terminal;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, CutArgs};
pub use commands::cut::run_cut;
pub use commands::encoders::run_encoders;
pub use commands::info::run_info;
pub use commands::preview::run_preview;

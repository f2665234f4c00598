//! Text generation backends and response normalization.

pub mod generator;
pub mod response;
pub mod subprocess;

pub use generator::Generator;
pub use response::normalize_response;
pub use subprocess::{CommandGenerator, check_program_installed};

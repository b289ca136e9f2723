pub mod config;
pub mod errors;
pub mod events;
pub mod hyperparams;

pub use config::*;
pub use errors::*;
pub use events::*;
pub use hyperparams::*;

pub mod errors;
pub mod sync;

pub use errors::{ListenerError, ThemeError, ThemeResult};

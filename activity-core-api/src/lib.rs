pub mod error;

pub use error::{ActivityError, ActivityResult};

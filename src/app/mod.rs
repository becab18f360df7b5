pub mod context;
pub mod error;

pub use context::{AppContext, StorePaths};
pub use error::{Result, TributaryError};

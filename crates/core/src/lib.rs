pub mod error;
pub mod models;
pub mod traits;
pub mod types;
pub mod utils;

pub use error::{QuantError, Result};
pub use models::{Bar, BarTable, BarTableSummary};
pub use traits::BarSource;
pub use types::{BarField, Exchange, Interval, Market};

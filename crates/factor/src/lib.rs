pub mod cache;
pub mod factors;
pub mod factory;
pub mod matrix;
pub mod series;
pub mod template;

pub use cache::{MatrixCache, MatrixProvider};
pub use factory::{create_factor, create_factors, FACTOR_NAMES};
pub use matrix::BarMatrix;
pub use series::{FactorEntry, FactorSeries};
pub use template::{Factor, FactorTemplate};

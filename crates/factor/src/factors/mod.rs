//! Factor formulas. Each struct implements [`Factor`](crate::template::Factor).

pub mod liquidity;
pub mod momentum;
pub mod shadow;
pub mod volatility;

pub use liquidity::{CVILLIQ, VPT};
pub use momentum::{MomentumFactor, ROCSpread};
pub use shadow::{WilliamsLowerShadow, WilliamsUpperShadow};
pub use volatility::{AbsRetNight, Volatility};

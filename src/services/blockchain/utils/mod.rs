pub mod keys;
pub mod math;
pub mod pda;

pub use keys::KeyUtils;
pub use math::{TokenMath, LAMPORTS_PER_SOL};
pub use pda::PdaUtils;

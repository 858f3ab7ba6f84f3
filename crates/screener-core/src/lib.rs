pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::*;
pub use filter::*;
pub use traits::*;
pub use types::*;

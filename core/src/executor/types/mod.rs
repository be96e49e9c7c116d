pub mod config;
pub mod policy;
pub mod result;
pub mod unit;

pub use config::*;
pub use policy::*;
pub use result::*;
pub use unit::*;

pub mod executor;
pub mod unit;

pub use executor::ExecutorError;
pub use unit::UnitError;

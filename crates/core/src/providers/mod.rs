pub mod registry;
pub mod traits;

// Oracle implementations
pub mod coincap;

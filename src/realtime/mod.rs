pub mod protocol;
pub mod registry;

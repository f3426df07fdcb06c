pub mod decoder;
pub mod store;

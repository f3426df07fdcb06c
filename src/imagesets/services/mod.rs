pub mod assemble;
pub mod coerce;
pub mod dicomize;
pub mod export;
pub mod frames;
pub mod populate;
pub mod vr;

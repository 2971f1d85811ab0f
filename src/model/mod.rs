pub mod er;
pub mod xml;

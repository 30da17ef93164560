pub mod capture;
pub mod classification;
pub mod detection;
pub mod display;
pub mod inference;
pub mod shared;

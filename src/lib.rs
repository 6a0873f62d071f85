pub mod barcode;
pub mod command;
pub mod count;
pub mod fileformat;
pub mod library;
pub mod pipeline;
pub mod runtime;
pub mod unit;

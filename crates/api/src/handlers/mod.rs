pub mod catalog;
pub mod image;

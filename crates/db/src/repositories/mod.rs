//! Repositories are zero-sized structs with associated async functions
//! taking `&PgPool`.

pub mod image_repo;

pub use image_repo::ImageRepo;

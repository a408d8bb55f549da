pub mod comment;
pub mod resource;
pub mod viewer;

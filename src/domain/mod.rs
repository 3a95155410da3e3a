pub mod engagement;
pub mod profile;
pub mod recipe;

pub mod auth;
pub mod engagement;
pub mod profiles;
pub mod recipes;

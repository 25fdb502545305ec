pub mod admin;
pub mod security;

pub mod auth;
pub mod mail;
pub mod matrix;
pub mod onedrive;
pub mod xlsx;

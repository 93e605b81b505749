pub mod auth;
pub mod backup;
pub mod categories;
pub mod customers;
pub mod presets;
pub mod settings;

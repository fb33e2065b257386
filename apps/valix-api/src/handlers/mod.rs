pub mod health;
pub mod validations;

pub mod health;
pub mod login;
pub mod tickets;
pub mod validate;

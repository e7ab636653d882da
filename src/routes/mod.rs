pub mod access;
pub mod audit;
pub mod auth;
pub mod health;
pub mod hotels;
pub mod roles;
pub mod users;

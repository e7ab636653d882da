pub mod audit;
pub mod hotel;
pub mod rbac;
pub mod session;
pub mod user;

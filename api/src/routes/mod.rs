pub mod health;
pub mod reflection;

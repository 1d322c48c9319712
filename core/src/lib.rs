pub mod auth;
pub mod cookbook;
pub mod curated;
pub mod db;
pub mod error;
pub mod gemini;
pub mod market;
pub mod mealdb;
pub mod models;
pub mod service;
pub mod session;

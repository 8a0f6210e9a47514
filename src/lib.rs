pub mod app;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod normalize;
pub mod repositories;
pub mod services;
pub mod validation;

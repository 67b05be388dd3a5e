pub mod dto;
mod repo;
pub mod repo_types;
pub mod services;
pub mod token;

pub mod browse;
pub mod builder;
pub mod config;
pub mod emails;
pub mod error;
pub mod geometry;
pub mod label;
pub mod literal;
pub mod metadata;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod product;
pub mod records;
pub mod time;
pub mod tools;

pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod patterns;
pub mod prefetch;
pub mod resolve;
pub mod runtime;
pub mod workflow;

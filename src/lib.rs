#![doc = "The `taskguard` library crate."]
#![doc = ""]
#![doc = "Token verification, principal resolution, and role-based authorization of"]
#![doc = "task and comment requests, plus the thin HTTP surface that exercises them."]
#![doc = "The binary (`main.rs`) wires these pieces into an Actix Web server."]

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;

pub use crate::error::AppError;

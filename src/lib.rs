//! Multi-user to-do list backend: per-user task lists behind a session-authenticated REST API.

pub mod auth;
pub mod config;
pub mod dao;
pub mod model;
pub mod web;

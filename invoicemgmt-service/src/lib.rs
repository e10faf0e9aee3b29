//! Invoice Management Service - invoice and payment lifecycle engine.

pub mod config;
pub mod dtos;
pub mod models;
pub mod services;
pub mod startup;

// src/handlers/mod.rs

pub mod admin;
pub mod ai;
pub mod attempt;
pub mod exam;
pub mod health;

#![forbid(unsafe_code)]

pub mod cache;
pub mod repository;
pub mod rest;
pub mod sqlite;

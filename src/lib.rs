// src/lib.rs

//! OSU schedule client library

pub mod cache;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

//! Service layer for the schedule client.
//!
//! This module contains:
//! - Raw upstream access (`Upstream`, `HttpUpstream`)
//! - The literal-syntax adapter and list decoder
//! - The HTML schedule decoder (`ScheduleDecoder`)
//! - The cached query facade (`ScheduleClient`)

pub mod client;
pub mod fetcher;
pub mod literal;
pub mod lists;
pub mod schedule;

pub use client::ScheduleClient;
pub use fetcher::{HttpUpstream, Params, Upstream};
pub use lists::decode_list;
pub use schedule::ScheduleDecoder;

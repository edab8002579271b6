//! Daily study planning: spaced-repetition review tracking, exam urgency and a
//! time-boxed "study now" schedule for each user.

pub mod allocate;
pub mod config;
pub mod error;
pub mod interval;
pub mod model;
pub mod priority;
pub mod review;
pub mod schedule;
pub mod service;
pub mod store;
pub mod urgency;
pub mod web;

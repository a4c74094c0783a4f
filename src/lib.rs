//! LeetCoach: a Telegram bot for daily LeetCode practice.
//!
//! The session core (`session`, `selection`, `grader`, `hints`, `scheduler`)
//! talks to the outside world only through the traits in `ports`.

pub mod bank;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod grader;
pub mod hints;
pub mod leetcode;
pub mod markup;
pub mod messages;
pub mod openai;
pub mod ports;
pub mod protocol;
pub mod routes;
pub mod scheduler;
pub mod selection;
pub mod session;
pub mod state;
pub mod store;
pub mod telegram;
pub mod telemetry;
pub mod util;

#[cfg(test)]
mod testing;

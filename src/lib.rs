#![forbid(unsafe_code)]

pub mod attempt_log;
pub mod batch;
pub mod build;
pub mod category;
pub mod check;
pub mod cli;
pub mod config;
pub mod epub;
pub mod error;
pub mod extract;
pub mod formats;
pub mod links;
pub mod logging;
pub mod results;
pub mod retry;
pub mod shell;

#[cfg(test)]
mod test_support;

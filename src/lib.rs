pub mod child_control;
pub mod commands;
pub mod config;
pub mod desktop;
pub mod host;
pub mod keys;
pub mod logging;
pub mod policy;
pub mod runner;
pub mod session;
pub mod shell;
pub mod workspaces;

mod utils;

#[cfg(test)]
mod testing;

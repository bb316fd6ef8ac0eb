//! familytree: command-line entry point of the family tree service
//!
//! The binary wires configuration, logging and the data directory to the
//! store (`familytree-databases`) and the HTTP API (`familytree-api`).

pub mod cli;

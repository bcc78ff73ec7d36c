//! Emulation of the five-switch POC network in front of a remote OpenFlow controller.
//!
//! Hosts are network namespaces, switches are Open vSwitch bridges and links are veth pairs, all
//! set up through shell commands issued by a [`runner::CommandRunner`].

pub mod cli;
pub mod config;
pub mod error;
pub mod intf_check;
pub mod net;
pub mod netns;
pub mod ofctl;
pub mod ready;
pub mod runner;
pub mod session;
pub mod switch;
pub mod topo;

pub use error::{Error, Result};

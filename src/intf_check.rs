//! Checks on hardware interfaces before they are bridged into the emulated network.

use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IPV4: Regex = Regex::new(r"\d+\.\d+\.\d+\.\d+").unwrap();
}

/// Interface names from `ip link show` output. Veth peers print as `s1-eth1@if4`, the suffix is
/// dropped.
pub fn link_names(ip_link: &str) -> Vec<&str> {
    ip_link
        .lines()
        .filter(|l| !l.starts_with(char::is_whitespace))
        .filter_map(|l| l.split(": ").nth(1))
        .map(|name| name.split('@').next().unwrap_or(name))
        .collect()
}

/// Make sure `intf` exists and is not configured.
///
/// Fails with [`Error::IntfMissing`] when `ip link show` does not list it and with
/// [`Error::IntfInUse`] when it carries an IPv4 address.
pub fn check_intf(runner: &dyn CommandRunner, intf: &str) -> Result<()> {
    let cmd = "ip link show";
    let links = runner.run(cmd)?.into_result(cmd)?.stdout;
    if !link_names(&links).contains(&intf) {
        return Err(Error::IntfMissing(intf.to_string()));
    }
    let cmd = format!("ip -4 addr show dev {}", intf);
    let addrs = runner.run(&cmd)?.into_result(&cmd)?.stdout;
    if IPV4.is_match(&addrs) {
        return Err(Error::IntfInUse(intf.to_string()));
    }
    Ok(())
}

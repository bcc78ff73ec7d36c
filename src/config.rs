use crate::ready::RetryPolicy;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

pub const DEFAULT_INTF1: &str = "s1-eth1";
pub const DEFAULT_INTF2: &str = "s5-eth1";
pub const DEFAULT_CONTROLLER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 11, 43);
pub const DEFAULT_INPUT_SWITCH: usize = 0;
pub const DEFAULT_OUTPUT_SWITCH: usize = 4;
pub const CONTROLLER_PORT: u16 = 6633;
pub const MANAGER_PORT: u16 = 6640;
pub const HISTORY_FILE: &str = ".poctopo_history";

/// Start the POC topology against a remote controller.
#[derive(StructOpt, Debug)]
#[structopt(name = "poctopo")]
pub struct Opt {
    /// First hardware interface name
    #[structopt(default_value = "s1-eth1")]
    pub hw_intf1: String,

    /// Second hardware interface name
    #[structopt(default_value = "s5-eth1")]
    pub hw_intf2: String,

    /// Controller ip
    #[structopt(default_value = "192.168.11.43")]
    pub controller_ip: Ipv4Addr,

    /// Switch number that the first interface is connected to (0 is s1)
    #[structopt(default_value = "0")]
    pub input_switch: usize,

    /// Switch number that the second interface is connected to (4 is s5)
    #[structopt(default_value = "4")]
    pub output_switch: usize,

    /// OpenFlow port of the controller
    #[structopt(long, default_value = "6633")]
    pub controller_port: u16,

    /// Port the local OVSDB manager listens on
    #[structopt(long, default_value = "6640")]
    pub manager_port: u16,

    /// Milliseconds between two flow table checks
    #[structopt(long, default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Give up after this many flow table checks (default: wait forever)
    #[structopt(long)]
    pub max_attempts: Option<u32>,

    /// Put h1 and h3 into this VLAN
    #[structopt(long)]
    pub vlan: Option<u16>,

    /// History file of the interactive shell
    #[structopt(long, parse(from_os_str), default_value = ".poctopo_history")]
    pub history: PathBuf,
}

/// Everything one run needs, fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub hw_intf1: String,
    pub hw_intf2: String,
    pub controller: SocketAddrV4,
    pub input_switch: usize,
    pub output_switch: usize,
    pub manager_port: u16,
    pub retry: RetryPolicy,
    pub vlan: Option<u16>,
    pub history: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            hw_intf1: DEFAULT_INTF1.to_string(),
            hw_intf2: DEFAULT_INTF2.to_string(),
            controller: SocketAddrV4::new(DEFAULT_CONTROLLER_IP, CONTROLLER_PORT),
            input_switch: DEFAULT_INPUT_SWITCH,
            output_switch: DEFAULT_OUTPUT_SWITCH,
            manager_port: MANAGER_PORT,
            retry: RetryPolicy::default(),
            vlan: None,
            history: PathBuf::from(HISTORY_FILE),
        }
    }
}

impl From<Opt> for SessionConfig {
    fn from(opt: Opt) -> SessionConfig {
        SessionConfig {
            hw_intf1: opt.hw_intf1,
            hw_intf2: opt.hw_intf2,
            controller: SocketAddrV4::new(opt.controller_ip, opt.controller_port),
            input_switch: opt.input_switch,
            output_switch: opt.output_switch,
            manager_port: opt.manager_port,
            retry: RetryPolicy {
                interval: Duration::from_millis(opt.poll_interval_ms),
                max_attempts: opt.max_attempts,
            },
            vlan: opt.vlan,
            history: opt.history,
        }
    }
}

/// A literal `help` as first argument asks for [`usage`].
pub fn wants_help<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().nth(1).map_or(false, |a| a.as_ref() == "help")
}

pub fn usage() -> String {
    let mut s = String::from("Usage:\n");
    s.push_str("Program gets arguments in following order:\n");
    s.push_str(&format!(
        " 1. First hardware interface name (default {})\n",
        DEFAULT_INTF1
    ));
    s.push_str(&format!(
        " 2. Second hardware interface name (default {})\n",
        DEFAULT_INTF2
    ));
    s.push_str(&format!(
        " 3. Controller ip (default {})\n",
        DEFAULT_CONTROLLER_IP
    ));
    s.push_str(&format!(
        " 4. Switch number that first interface is connected to (default {} - represents s{})\n",
        DEFAULT_INPUT_SWITCH,
        DEFAULT_INPUT_SWITCH + 1
    ));
    s.push_str(&format!(
        " 5. Switch number that second interface is connected to (default {} - represents s{})\n",
        DEFAULT_OUTPUT_SWITCH,
        DEFAULT_OUTPUT_SWITCH + 1
    ));
    s.push_str("Run with --help for the optional flags.\n");
    s
}

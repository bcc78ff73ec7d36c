//! Detection of controller-installed flows on the boundary switches.
//!
//! The controller pushes its flows some time after the switches connect. There is no
//! acknowledgement for that, so the flow tables are polled until they show the flows expected
//! for the port facing the hardware interface: traffic matched on that port, traffic sent out of
//! that port, and an LLDP (`dl_type=0x88cc`) rule.
//!
//! The check is a plain substring search over `ovs-ofctl dump-flows` output. `in_port=1` also
//! matches `in_port=12`; semantically equal flows printed differently are not recognized.

use crate::ofctl::OfCtl;
use crate::switch::OVSSwitch;
use log::debug;
use std::future::Future;
use std::time::Duration;

/// Ether type of LLDP frames.
pub const LLDP_MATCH: &str = "dl_type=0x88cc";

/// True if `flows` has an ingress match on `port`, an output to `port` and an LLDP match.
pub fn flows_present(flows: &str, port: u32) -> bool {
    let in_port = format!("in_port={}", port);
    let out_port = format!("output:{}", port);
    flows.contains(&in_port) && flows.contains(&out_port) && flows.contains(LLDP_MATCH)
}

/// Check one switch. Any failure to query the switch or to find the port counts as not ready.
pub fn switch_ready(ofctl: &OfCtl, switch: &OVSSwitch, intf: &str) -> bool {
    let flows = match ofctl.dump_flows(&switch.name) {
        Ok(f) => f,
        Err(e) => {
            debug!("{}: {}", switch.name, e);
            return false;
        }
    };
    let ports = match ofctl.port_mapping(&switch.name, switch.intf_names()) {
        Ok(p) => p,
        Err(e) => {
            debug!("{}: {}", switch.name, e);
            return false;
        }
    };
    match ports.get(intf) {
        Some(port) => flows_present(&flows, *port),
        None => {
            debug!("{}: no OpenFlow port for {}", switch.name, intf);
            false
        }
    }
}

/// Check if all flows arrived from the controller on both switches.
pub fn is_ready(
    ofctl: &OfCtl,
    switch1: &OVSSwitch,
    intf1: &str,
    switch2: &OVSSwitch,
    intf2: &str,
) -> bool {
    // no short-circuit, both switches are queried on every attempt
    let one = switch_ready(ofctl, switch1, intf1);
    let two = switch_ready(ofctl, switch2, intf2);
    one && two
}

/// How often and how long to poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
}

/// Evaluate `check` until it holds, sleeping `policy.interval` between attempts.
pub async fn wait_until<F>(policy: RetryPolicy, mut check: F) -> WaitOutcome
where
    F: FnMut() -> bool,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        if check() {
            return WaitOutcome::Ready { attempts };
        }
        debug!("not ready after attempt {}", attempts);
        if policy.max_attempts.map_or(false, |max| attempts >= max) {
            return WaitOutcome::TimedOut { attempts };
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// Poll [`is_ready`] under `policy`.
pub fn wait_until_ready<'a>(
    policy: RetryPolicy,
    ofctl: &'a OfCtl<'a>,
    switch1: &'a OVSSwitch,
    intf1: &'a str,
    switch2: &'a OVSSwitch,
    intf2: &'a str,
) -> impl Future<Output = WaitOutcome> + 'a {
    wait_until(policy, move || is_ready(ofctl, switch1, intf1, switch2, intf2))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ofctl::OPENFLOW13;
    use crate::runner::ScriptedRunner;
    use std::cell::Cell;
    use tokio::time::Instant;

    const FLOWS: &str = "OFPST_FLOW reply (OF1.3) (xid=0x2):
 cookie=0x2b00000000000003, duration=12.1s, table=0, n_packets=4, n_bytes=240, priority=100,dl_type=0x88cc actions=CONTROLLER:65535
 cookie=0x2a00000000000000, duration=9.4s, table=0, n_packets=0, n_bytes=0, priority=2,in_port=1 actions=output:2,output:3
 cookie=0x2a00000000000001, duration=9.4s, table=0, n_packets=0, n_bytes=0, priority=2,in_port=2 actions=output:1
 cookie=0x0, duration=15.0s, table=0, n_packets=7, n_bytes=420, priority=1000 actions=drop
";

    #[test]
    fn all_three_needed() {
        assert!(flows_present(FLOWS, 1));
        assert!(flows_present(FLOWS, 2));
        assert!(!flows_present(FLOWS, 3));

        let no_in = FLOWS.replace("in_port=1 ", "in_port=9 ");
        assert!(!flows_present(&no_in, 1));
        let no_out = FLOWS.replace("output:1", "output:9");
        assert!(!flows_present(&no_out, 1));
        let no_lldp = FLOWS.replace("dl_type=0x88cc", "dl_type=0x0800");
        assert!(!flows_present(&no_lldp, 1));
        assert!(!flows_present("", 1));
    }

    fn switch(runner: &ScriptedRunner, name: &str, ports: &[&str]) -> OVSSwitch {
        let mut s = OVSSwitch::create(runner, name, OPENFLOW13).unwrap();
        for (i, p) in ports.iter().enumerate() {
            s.add_port(runner, p, Some(i as u32 + 1)).unwrap();
        }
        s
    }

    #[test]
    fn both_switches_must_be_ready() {
        let runner = ScriptedRunner::new();
        let s1 = switch(&runner, "s1", &["s1-eth1", "s1-eth2"]);
        let s5 = switch(&runner, "s5", &["s5-eth1", "s5-eth2"]);
        runner.respond_ok(
            "ovs-ofctl -O OpenFlow13 dump-ports-desc s1",
            " 1(s1-eth1): addr:aa\n 2(s1-eth2): addr:bb\n",
        );
        runner.respond_ok(
            "ovs-ofctl -O OpenFlow13 dump-ports-desc s5",
            " 1(s5-eth1): addr:cc\n 2(s5-eth2): addr:dd\n",
        );
        let ofctl = OfCtl::new(&runner, OPENFLOW13);

        runner.respond_ok("ovs-ofctl -O OpenFlow13 dump-flows s1", FLOWS);
        assert!(!is_ready(&ofctl, &s1, "s1-eth1", &s5, "s5-eth1"));

        runner.respond_ok("ovs-ofctl -O OpenFlow13 dump-flows s5", FLOWS);
        assert!(is_ready(&ofctl, &s1, "s1-eth1", &s5, "s5-eth1"));

        // unresolved port
        assert!(!is_ready(&ofctl, &s1, "s1-eth7", &s5, "s5-eth1"));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_ready() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let outcome = wait_until(RetryPolicy::default(), || {
            calls.set(calls.get() + 1);
            calls.get() == 4
        })
        .await;
        assert_eq!(outcome, WaitOutcome::Ready { attempts: 4 });
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_attempts() {
        let policy = RetryPolicy {
            interval: Duration::from_millis(250),
            max_attempts: Some(3),
        };
        let start = Instant::now();
        let outcome = wait_until(policy, || false).await;
        assert_eq!(outcome, WaitOutcome::TimedOut { attempts: 3 });
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(750));
    }
}

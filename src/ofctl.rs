//! Access to switch flow tables through `ovs-ofctl`.

use crate::error::Result;
use crate::runner::CommandRunner;
use std::collections::BTreeMap;

/// Protocol version every switch speaks.
pub const OPENFLOW13: &str = "OpenFlow13";

/// OS interface name to OpenFlow port number.
pub type PortMapping = BTreeMap<String, u32>;

/// `ovs-ofctl` bound to one protocol version.
pub struct OfCtl<'a> {
    runner: &'a dyn CommandRunner,
    protocol: &'a str,
}

impl<'a> OfCtl<'a> {
    pub fn new(runner: &'a dyn CommandRunner, protocol: &'a str) -> OfCtl<'a> {
        OfCtl { runner, protocol }
    }

    fn ofctl(&self, args: &str) -> Result<String> {
        let cmd = format!("ovs-ofctl -O {} {}", self.protocol, args);
        Ok(self.runner.run(&cmd)?.into_result(&cmd)?.stdout)
    }

    pub fn dump_flows(&self, switch: &str) -> Result<String> {
        self.ofctl(&format!("dump-flows {}", switch))
    }

    pub fn dump_ports_desc(&self, switch: &str) -> Result<String> {
        self.ofctl(&format!("dump-ports-desc {}", switch))
    }

    pub fn add_flow(&self, switch: &str, flow: &str) -> Result<()> {
        self.ofctl(&format!("add-flow {} \"{}\"", switch, flow))?;
        Ok(())
    }

    /// Delete every flow, or with `strict_match` exactly the flow with that match and priority.
    pub fn del_flows(&self, switch: &str, strict_match: Option<&str>) -> Result<()> {
        match strict_match {
            Some(m) => self.ofctl(&format!("--strict del-flows {} \"{}\"", switch, m))?,
            None => self.ofctl(&format!("del-flows {}", switch))?,
        };
        Ok(())
    }

    /// Dump the port descriptions of `switch` and resolve `intfs` against them.
    pub fn port_mapping(&self, switch: &str, intfs: &[String]) -> Result<PortMapping> {
        let desc = self.dump_ports_desc(switch)?;
        Ok(resolve_ports(intfs, &desc))
    }
}

/// Map interface names to OpenFlow port numbers using a `dump-ports-desc` listing.
///
/// A port shows up as ` 3(s1-eth2): addr:...`; the token before the parenthesis is the number.
/// Names not in the listing, or listed with a non-numeric port such as `LOCAL`, are left out.
pub fn resolve_ports(intfs: &[String], ports_desc: &str) -> PortMapping {
    let mut ports = PortMapping::new();
    for intf in intfs {
        let needle = format!("({})", intf);
        let number = ports_desc
            .lines()
            .find(|l| l.contains(&needle))
            .and_then(|l| l.trim_start().split('(').next())
            .and_then(|n| n.trim().parse::<u32>().ok());
        if let Some(number) = number {
            ports.insert(intf.clone(), number);
        }
    }
    ports
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};

    const PORTS_DESC: &str = "OFPST_PORT_DESC reply (OF1.3) (xid=0x2):
 1(s1-eth1): addr:7a:1c:4e:2b:90:01
     config:     0
     state:      LIVE
     speed: 10000 Mbps now, 0 Mbps max
 3(s1-eth2): addr:7a:1c:4e:2b:90:02
     config:     0
     state:      LIVE
 12(s1-eth12): addr:7a:1c:4e:2b:90:0c
     config:     0
 LOCAL(s1): addr:7a:1c:4e:2b:90:00
     config:     PORT_DOWN
";

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_listed_ports() {
        let ports = resolve_ports(&names(&["s1-eth2", "s1-eth1", "s1-eth12"]), PORTS_DESC);
        assert_eq!(ports.get("s1-eth2"), Some(&3));
        assert_eq!(ports.get("s1-eth1"), Some(&1));
        assert_eq!(ports.get("s1-eth12"), Some(&12));
    }

    #[test]
    fn unknown_ports_are_omitted() {
        let ports = resolve_ports(&names(&["s1-eth7", "s1"]), PORTS_DESC);
        assert!(ports.is_empty());
        assert_eq!(ports.get("s1-eth7"), None);
    }

    #[test]
    fn command_lines() {
        let runner = ScriptedRunner::new();
        runner.respond_ok("ovs-ofctl -O OpenFlow13 dump-ports-desc s1", PORTS_DESC);
        let ofctl = OfCtl::new(&runner, OPENFLOW13);

        ofctl.add_flow("s1", "priority=1000,actions=drop").unwrap();
        ofctl.del_flows("s1", Some("priority=1000")).unwrap();
        ofctl.del_flows("s5", None).unwrap();
        let ports = ofctl.port_mapping("s1", &names(&["s1-eth1"])).unwrap();
        assert_eq!(ports.get("s1-eth1"), Some(&1));

        assert_eq!(
            runner.history(),
            vec![
                "ovs-ofctl -O OpenFlow13 add-flow s1 \"priority=1000,actions=drop\"",
                "ovs-ofctl -O OpenFlow13 --strict del-flows s1 \"priority=1000\"",
                "ovs-ofctl -O OpenFlow13 del-flows s5",
                "ovs-ofctl -O OpenFlow13 dump-ports-desc s1",
            ]
        );
    }

    #[test]
    fn dump_of_missing_bridge_fails() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "ovs-ofctl -O OpenFlow13 dump-flows s9",
            CommandOutput::failed("ovs-ofctl: s9 is not a bridge or a socket"),
        );
        assert!(OfCtl::new(&runner, OPENFLOW13).dump_flows("s9").is_err());
    }
}

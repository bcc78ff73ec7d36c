use crate::error::Result;
use crate::runner::{run_logged, CommandRunner};
use std::net::SocketAddrV4;

/// An Open vSwitch bridge. The bridge carries the switch name, so `ovs-ofctl` can address it
/// directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OVSSwitch {
    pub name: String,
    ports: Vec<String>,
}

impl OVSSwitch {
    pub fn create(runner: &dyn CommandRunner, name: &str, protocols: &str) -> Result<OVSSwitch> {
        let cmd = format!(
            "ovs-vsctl --may-exist add-br {0} -- set bridge {0} protocols={1} -- set-fail-mode {0} secure",
            name, protocols
        );
        runner.run(&cmd)?.into_result(&cmd)?;
        Ok(OVSSwitch {
            name: name.to_string(),
            ports: vec![],
        })
    }

    pub fn del(runner: &dyn CommandRunner, name: &str) {
        run_logged(
            runner,
            &format!("ovs-vsctl --if-exists del-br {}", name),
            "del bridge",
        );
    }

    /// Attach `port_name`. With `ofport` the OpenFlow port number is requested explicitly.
    pub fn add_port(
        &mut self,
        runner: &dyn CommandRunner,
        port_name: &str,
        ofport: Option<u32>,
    ) -> Result<()> {
        let mut cmd = format!("ovs-vsctl --may-exist add-port {} {}", self.name, port_name);
        if let Some(ofport) = ofport {
            cmd.push_str(&format!(
                " -- set Interface {} ofport_request={}",
                port_name, ofport
            ));
        }
        runner.run(&cmd)?.into_result(&cmd)?;
        self.ports.push(port_name.to_string());
        Ok(())
    }

    pub fn set_controller(&self, runner: &dyn CommandRunner, addr: SocketAddrV4) -> Result<()> {
        let cmd = format!("ovs-vsctl set-controller {} tcp:{}", self.name, addr);
        runner.run(&cmd)?.into_result(&cmd)?;
        Ok(())
    }

    /// Names of all attached ports, in attach order.
    pub fn intf_names(&self) -> &[String] {
        &self.ports
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::runner::{CommandOutput, ScriptedRunner};

    #[test]
    fn create_and_attach() {
        let runner = ScriptedRunner::new();
        let mut s = OVSSwitch::create(&runner, "s1", "OpenFlow13").unwrap();
        s.add_port(&runner, "s1-eth1", Some(1)).unwrap();
        s.add_port(&runner, "enp3s0", None).unwrap();
        s.set_controller(&runner, "10.1.1.1:6633".parse().unwrap())
            .unwrap();

        assert_eq!(s.intf_names(), &["s1-eth1", "enp3s0"]);
        assert_eq!(
            runner.history(),
            vec![
                "ovs-vsctl --may-exist add-br s1 -- set bridge s1 protocols=OpenFlow13 -- set-fail-mode s1 secure",
                "ovs-vsctl --may-exist add-port s1 s1-eth1 -- set Interface s1-eth1 ofport_request=1",
                "ovs-vsctl --may-exist add-port s1 enp3s0",
                "ovs-vsctl set-controller s1 tcp:10.1.1.1:6633",
            ]
        );
    }

    #[test]
    fn failed_port_is_not_recorded() {
        let runner = ScriptedRunner::new();
        let mut s = OVSSwitch::create(&runner, "s2", "OpenFlow13").unwrap();
        runner.respond("ovs-vsctl --may-exist add-port", CommandOutput::failed("no such device"));
        match s.add_port(&runner, "s2-eth9", Some(9)) {
            Err(Error::CommandFailed { stderr, .. }) => assert_eq!(stderr, "no such device"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(s.intf_names().is_empty());
    }
}

use crate::error::{Error, Result};
use crate::netns::NetNamespace;
use crate::runner::{run_logged, CommandOutput, CommandRunner};
use crate::switch::OVSSwitch;
use crate::topo::Topo;
use log::{debug, info};
use std::net::{Ipv4Addr, SocketAddrV4};

/// Parameters shared by every switch of an emulated network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetConfig {
    pub controller: SocketAddrV4,
    pub protocols: String,
}

/// An emulated network: hosts in namespaces, OVS bridges as switches, veth pairs as links.
pub struct Net {
    pub config: NetConfig,
    pub host: Vec<Host>,
    pub ovsswitch: Vec<OVSSwitch>,
    pub links: Vec<VethPair>,
    /// Interfaces of the machine bridged into a switch.
    pub hw_intfs: Vec<Intf>,
    runner: Box<dyn CommandRunner>,
}

impl Net {
    pub fn new(runner: Box<dyn CommandRunner>, config: NetConfig) -> Net {
        Net {
            config,
            host: vec![],
            ovsswitch: vec![],
            links: vec![],
            hw_intfs: vec![],
            runner,
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Create every node and link of `topo`. Leftovers with the same names are removed first.
    pub fn build(&mut self, topo: &Topo) -> Result<()> {
        self.clean(topo);
        info!("*** Adding hosts: {}", topo.hosts().join(" "));
        for (i, name) in topo.hosts().iter().enumerate() {
            self.add_host(name, Ipv4Addr::new(10, 0, 0, i as u8 + 1))?;
        }
        info!("*** Adding switches: {}", topo.switches().join(" "));
        for name in topo.switches() {
            self.add_switch(name)?;
        }
        info!("*** Adding links");
        for ((a, b), (intf_a, intf_b)) in topo.links().iter().zip(topo.link_intfs()) {
            debug!("({}, {})", a, b);
            self.add_link(a, &intf_a, b, &intf_b)?;
        }
        Ok(())
    }

    /// Point every switch at the controller and bring the links and hardware interfaces up.
    pub fn start(&mut self) -> Result<()> {
        info!("*** Starting {} switches", self.ovsswitch.len());
        for s in self.ovsswitch.iter() {
            s.set_controller(self.runner.as_ref(), self.config.controller)?;
        }
        for link in self.links.iter() {
            link.one.up(self.runner.as_ref());
            link.two.up(self.runner.as_ref());
        }
        for i in self.hw_intfs.iter() {
            i.up(self.runner.as_ref());
        }
        for h in self.host.iter() {
            h.config(self.runner.as_ref());
        }
        Ok(())
    }

    /// Tear everything down.
    pub fn stop(&mut self) {
        info!("*** Stopping {} switches", self.ovsswitch.len());
        for s in self.ovsswitch.drain(..) {
            OVSSwitch::del(self.runner.as_ref(), &s.name);
        }
        for link in self.links.drain(..) {
            link.one.del(self.runner.as_ref());
        }
        self.hw_intfs.clear();
        info!("*** Stopping {} hosts", self.host.len());
        for h in self.host.drain(..) {
            h.netns.del(self.runner.as_ref());
        }
    }

    /// Remove bridges, veths and namespaces a previous run of `topo` may have left behind.
    pub fn clean(&self, topo: &Topo) {
        let r = self.runner.as_ref();
        for s in topo.switches() {
            OVSSwitch::del(r, s);
        }
        for (one, _) in topo.link_intfs() {
            r.run(&format!("ip link del {} 2> /dev/null", one)).ok();
        }
        let existing = r.run("ip netns list").map(|o| o.stdout).unwrap_or_default();
        for h in topo.hosts() {
            let ns = NetNamespace::for_host(h);
            if existing
                .lines()
                .filter_map(|l| l.split_whitespace().next())
                .any(|n| n == ns.name)
            {
                ns.del(r);
            }
        }
    }

    pub fn add_host(&mut self, name: &str, ip: Ipv4Addr) -> Result<Host> {
        let netns = NetNamespace::for_host(name);
        netns.get_or_add(self.runner.as_ref())?;
        let host = Host::new(name.to_string(), netns, ip);
        self.host.push(host.clone());
        Ok(host)
    }

    pub fn add_switch(&mut self, name: &str) -> Result<OVSSwitch> {
        let s = OVSSwitch::create(self.runner.as_ref(), name, &self.config.protocols)?;
        self.ovsswitch.push(s.clone());
        Ok(s)
    }

    /// Connect node `a` (interface `intf_a`) with node `b` (interface `intf_b`).
    pub fn add_link(&mut self, a: &str, intf_a: &str, b: &str, intf_b: &str) -> Result<()> {
        let cmd = format!("ip link add {} type veth peer name {}", intf_a, intf_b);
        self.runner.run(&cmd)?.into_result(&cmd)?;
        let one = self.attach(a, intf_a)?;
        let two = self.attach(b, intf_b)?;
        self.links.push(VethPair { one, two });
        Ok(())
    }

    fn attach(&mut self, node: &str, intf: &str) -> Result<Intf> {
        let runner = self.runner.as_ref();
        if let Some(h) = self.host.iter_mut().find(|h| h.name == node) {
            let mut i = Intf::new(intf);
            i.move_to_netns(runner, &h.netns)?;
            h.intfs.push(intf.to_string());
            return Ok(i);
        }
        if let Some(s) = self.ovsswitch.iter_mut().find(|s| s.name == node) {
            s.add_port(runner, intf, ofport_of(intf))?;
            return Ok(Intf::new(intf));
        }
        Err(Error::NoSuchNode(node.to_string()))
    }

    /// Bridge an existing interface of the machine into switch `index`.
    pub fn add_hw_intf(&mut self, index: usize, intf: &str) -> Result<()> {
        let count = self.ovsswitch.len();
        let runner = self.runner.as_ref();
        let s = self
            .ovsswitch
            .get_mut(index)
            .ok_or(Error::NoSuchSwitch { index, count })?;
        info!("*** Adding hardware interface {} to switch {}", intf, s.name);
        s.add_port(runner, intf, None)?;
        self.hw_intfs.push(Intf::new(intf));
        Ok(())
    }

    pub fn switch(&self, index: usize) -> Result<&OVSSwitch> {
        self.ovsswitch.get(index).ok_or(Error::NoSuchSwitch {
            index,
            count: self.ovsswitch.len(),
        })
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.host.iter().find(|h| h.name == name)
    }

    pub fn get_switch(&self, name: &str) -> Option<&OVSSwitch> {
        self.ovsswitch.iter().find(|s| s.name == name)
    }
}

/// OpenFlow port number a switch interface gets, taken from its `-ethN` suffix.
fn ofport_of(intf: &str) -> Option<u32> {
    intf.rsplit("-eth").next().and_then(|n| n.parse().ok())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub netns: NetNamespace,
    pub ip: Ipv4Addr,
    pub intfs: Vec<String>,
}

impl Host {
    pub fn new(name: String, netns: NetNamespace, ip: Ipv4Addr) -> Host {
        Host {
            name,
            netns,
            ip,
            intfs: vec![],
        }
    }

    /// Loopback up and the default interface addressed.
    pub fn config(&self, runner: &dyn CommandRunner) {
        let mut loopback = Intf::new("lo");
        loopback.netns = Some(self.netns.clone());
        loopback.up(runner);
        if let Some(first) = self.intfs.first() {
            let mut i = Intf::new(first);
            i.netns = Some(self.netns.clone());
            i.ip = Some((self.ip, 8));
            i.set_ip(runner);
        }
    }

    /// Run `cmd` inside this host.
    pub fn cmd(&self, runner: &dyn CommandRunner, cmd: &str) -> Result<CommandOutput> {
        self.netns.exec_shell(runner, cmd)
    }

    /// Add a tagged sub-interface `<default intf>.<vlan>` with address `addr`.
    pub fn add_vlan(&self, runner: &dyn CommandRunner, vlan: u16, addr: (Ipv4Addr, u8)) {
        let base = match self.intfs.first() {
            Some(b) => b,
            None => return,
        };
        let sub = format!("{}.{}", base, vlan);
        run_logged(runner, "modprobe 8021q", "load 8021q");
        let cmds = [
            format!("ip link add link {} name {} type vlan id {}", base, sub, vlan),
            format!("ip addr add {}/{} dev {}", addr.0, addr.1, sub),
            format!("ip link set up {}", sub),
        ];
        for c in cmds.iter() {
            run_logged(runner, &self.netns.wrap(c), "set vlan");
        }
    }
}

pub struct VethPair {
    pub one: Intf,
    pub two: Intf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intf {
    pub name: String,
    pub netns: Option<NetNamespace>,
    pub ip: Option<(Ipv4Addr, u8)>,
}

impl Intf {
    pub fn new(name: &str) -> Intf {
        Intf {
            name: name.to_string(),
            netns: None,
            ip: None,
        }
    }

    fn exec(&self, runner: &dyn CommandRunner, cmd: &str, when: &str) -> CommandOutput {
        match self.netns.as_ref() {
            Some(ns) => run_logged(runner, &ns.wrap(cmd), when),
            None => run_logged(runner, cmd, when),
        }
    }

    pub fn move_to_netns(&mut self, runner: &dyn CommandRunner, netns: &NetNamespace) -> Result<()> {
        let cmd = format!("ip link set {} netns {}", self.name, netns.name);
        let cmd = match self.netns.replace(netns.clone()) {
            Some(old) => old.wrap(&cmd),
            None => cmd,
        };
        runner.run(&cmd)?.into_result(&cmd)?;
        Ok(())
    }

    pub fn set_ip(&self, runner: &dyn CommandRunner) {
        if let Some((ip, prefix)) = self.ip.as_ref() {
            self.exec(
                runner,
                &format!("ip address add {}/{} dev {}", ip, prefix, self.name),
                "set ip",
            );
        }
    }

    pub fn up(&self, runner: &dyn CommandRunner) {
        self.exec(runner, &format!("ip link set {} up", self.name), "set intf up");
    }

    /// Deleting one end of a veth pair removes the peer too.
    pub fn del(&self, runner: &dyn CommandRunner) {
        self.exec(runner, &format!("ip link del {}", self.name), "del intf");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runner::ScriptedRunner;

    fn net(runner: &ScriptedRunner) -> Net {
        Net::new(
            Box::new(runner.clone()),
            NetConfig {
                controller: "192.168.11.43:6633".parse().unwrap(),
                protocols: "OpenFlow13".to_string(),
            },
        )
    }

    #[test]
    fn build_poc() {
        let runner = ScriptedRunner::new();
        let mut net = net(&runner);
        net.build(&Topo::poc()).unwrap();

        let hosts: Vec<&str> = net.host.iter().map(|h| h.name.as_str()).collect();
        let switches: Vec<&str> = net.ovsswitch.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(hosts, vec!["h1", "h2", "h3", "h4"]);
        assert_eq!(switches, vec!["s1", "s2", "s3", "s4", "s5"]);
        assert_eq!(net.links.len(), 11);

        assert_eq!(net.get_host("h3").unwrap().ip, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(net.get_host("h3").unwrap().intfs, vec!["h3-eth0"]);
        assert_eq!(
            net.get_switch("s5").unwrap().intf_names(),
            &["s5-eth1", "s5-eth2", "s5-eth3", "s5-eth4"]
        );
        assert!(runner.ran("ip link add h1-eth0 type veth peer name s1-eth1"));
        assert!(runner.ran("ip link set h1-eth0 netns poc-h1"));
        assert!(runner
            .ran("ovs-vsctl --may-exist add-port s1 s1-eth1 -- set Interface s1-eth1 ofport_request=1"));
    }

    #[test]
    fn start_and_stop() {
        let runner = ScriptedRunner::new();
        let mut net = net(&runner);
        net.build(&Topo::poc()).unwrap();
        net.start().unwrap();

        assert!(runner.ran("ovs-vsctl set-controller s3 tcp:192.168.11.43:6633"));
        assert!(runner.ran("ip netns exec poc-h2 ip link set h2-eth0 up"));
        assert!(runner.ran("ip netns exec poc-h2 ip link set lo up"));
        assert!(runner.ran("ip netns exec poc-h2 ip address add 10.0.0.2/8 dev h2-eth0"));
        assert!(runner.ran("ip link set s4-eth3 up"));

        net.stop();
        assert!(net.ovsswitch.is_empty() && net.host.is_empty() && net.links.is_empty());
        assert!(runner.ran("ovs-vsctl --if-exists del-br s5"));
        assert!(runner.ran("ip netns exec poc-h4 ip link del h4-eth0"));
        assert!(runner.ran("ip link del s1-eth3"));
        assert!(runner.ran("ip netns del poc-h1"));
    }

    #[test]
    fn hardware_intf_and_bounds() {
        let runner = ScriptedRunner::new();
        let mut net = net(&runner);
        net.build(&Topo::poc()).unwrap();
        net.add_hw_intf(4, "enp4s0").unwrap();
        assert_eq!(net.switch(4).unwrap().intf_names().last().unwrap(), "enp4s0");
        assert!(runner.ran("ovs-vsctl --may-exist add-port s5 enp4s0"));
        match net.add_hw_intf(5, "enp5s0") {
            Err(Error::NoSuchSwitch { index: 5, count: 5 }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(net.hw_intfs.len(), 1);

        assert!(!runner.ran("ip link set enp4s0 up"));
        net.start().unwrap();
        assert!(runner.ran("ip link set enp4s0 up"));
    }

    #[test]
    fn vlan() {
        let runner = ScriptedRunner::new();
        let mut net = net(&runner);
        net.build(&Topo::poc()).unwrap();
        net.get_host("h1")
            .unwrap()
            .add_vlan(net.runner(), 300, (Ipv4Addr::new(10, 0, 0, 1), 24));
        assert!(runner.ran("modprobe 8021q"));
        assert!(runner.ran(
            "ip netns exec poc-h1 ip link add link h1-eth0 name h1-eth0.300 type vlan id 300"
        ));
        assert!(runner.ran("ip netns exec poc-h1 ip addr add 10.0.0.1/24 dev h1-eth0.300"));
        assert!(runner.ran("ip netns exec poc-h1 ip link set up h1-eth0.300"));
    }

    #[test]
    fn ofport_numbers() {
        assert_eq!(ofport_of("s1-eth4"), Some(4));
        assert_eq!(ofport_of("s12-eth10"), Some(10));
        assert_eq!(ofport_of("enp3s0"), None);
    }
}

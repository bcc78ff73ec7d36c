//! The run of one POC session: build the network, hold traffic on the boundary switches until
//! the controller has populated them, hand over to the operator, tear down.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::intf_check::check_intf;
use crate::net::{Net, NetConfig};
use crate::ofctl::{OfCtl, OPENFLOW13};
use crate::ready::{wait_until_ready, WaitOutcome};
use crate::runner::CommandRunner;
use crate::switch::OVSSwitch;
use crate::topo::Topo;
use log::info;
use std::net::Ipv4Addr;

/// Installed on both boundary switches while the controller has not yet delivered its flows.
pub const HOLD_FLOW: &str = "priority=1000,actions=drop";
/// Match (with priority) selecting exactly [`HOLD_FLOW`] for a strict delete.
pub const HOLD_MATCH: &str = "priority=1000";

/// Hosts put into the VLAN with `--vlan`, with their address inside it.
const VLAN_HOSTS: [(&str, [u8; 4]); 2] = [("h1", [10, 0, 0, 1]), ("h3", [10, 0, 0, 3])];

pub struct Session {
    pub config: SessionConfig,
    pub net: Net,
}

impl Session {
    /// Everything up to and including the hold flows. Fails before touching the network if a
    /// hardware interface is unusable or a boundary switch index is out of range. A failure
    /// after that tears down whatever was already built.
    pub fn start(config: SessionConfig, runner: Box<dyn CommandRunner>) -> Result<Session> {
        let topo = Topo::poc();

        let cmd = format!("ovs-vsctl set-manager ptcp:{}", config.manager_port);
        runner.run(&cmd)?.into_result(&cmd)?;

        for (intf, index) in boundaries(&config) {
            let count = topo.switches().len();
            if index >= count {
                return Err(Error::NoSuchSwitch { index, count });
            }
            if !is_internal(&topo, intf) {
                check_intf(runner.as_ref(), intf)?;
            }
        }

        let net = Net::new(
            runner,
            NetConfig {
                controller: config.controller,
                protocols: OPENFLOW13.to_string(),
            },
        );
        let mut session = Session { config, net };
        if let Err(e) = session.bring_up(&topo) {
            session.stop();
            return Err(e);
        }
        Ok(session)
    }

    fn bring_up(&mut self, topo: &Topo) -> Result<()> {
        self.net.build(topo)?;
        for (intf, index) in boundaries(&self.config) {
            if !is_internal(topo, intf) {
                self.net.add_hw_intf(index, intf)?;
            }
        }

        info!("*** Starting network, controller at {}", self.config.controller);
        self.net.start()?;

        if let Some(vlan) = self.config.vlan {
            for (name, ip) in VLAN_HOSTS.iter() {
                if let Some(h) = self.net.get_host(name) {
                    h.add_vlan(self.net.runner(), vlan, (Ipv4Addr::from(*ip), 24));
                }
            }
        }

        let (one, two) = self.boundary_switches()?;
        let ofctl = self.ofctl();
        for s in [one, two].iter() {
            info!("*** Holding traffic on {}", s.name);
            ofctl.add_flow(&s.name, HOLD_FLOW)?;
        }
        Ok(())
    }

    pub fn ofctl(&self) -> OfCtl<'_> {
        OfCtl::new(self.net.runner(), OPENFLOW13)
    }

    pub fn boundary_switches(&self) -> Result<(&OVSSwitch, &OVSSwitch)> {
        Ok((
            self.net.switch(self.config.input_switch)?,
            self.net.switch(self.config.output_switch)?,
        ))
    }

    /// Poll the boundary switches. Returns the number of attempts it took.
    pub async fn wait_ready(&self) -> Result<u32> {
        let (one, two) = self.boundary_switches()?;
        let ofctl = self.ofctl();
        info!(
            "*** Waiting for controller flows on {} ({}) and {} ({})",
            one.name, self.config.hw_intf1, two.name, self.config.hw_intf2
        );
        let outcome = wait_until_ready(
            self.config.retry,
            &ofctl,
            one,
            &self.config.hw_intf1,
            two,
            &self.config.hw_intf2,
        )
        .await;
        match outcome {
            WaitOutcome::Ready { attempts } => {
                info!("*** Flows arrived after {} checks", attempts);
                Ok(attempts)
            }
            WaitOutcome::TimedOut { attempts } => Err(Error::NotReady(attempts)),
        }
    }

    /// Remove the hold flows, leaving the controller's flows in place.
    pub fn release(&self) -> Result<()> {
        let (one, two) = self.boundary_switches()?;
        let ofctl = self.ofctl();
        for s in [one, two].iter() {
            info!("*** Releasing traffic on {}", s.name);
            ofctl.del_flows(&s.name, Some(HOLD_MATCH))?;
        }
        Ok(())
    }

    pub fn stop(mut self) {
        self.net.stop();
    }
}

fn boundaries(config: &SessionConfig) -> [(&str, usize); 2] {
    [
        (config.hw_intf1.as_str(), config.input_switch),
        (config.hw_intf2.as_str(), config.output_switch),
    ]
}

/// Interfaces the topology creates itself are not hardware and need no bridging.
fn is_internal(topo: &Topo, intf: &str) -> bool {
    topo.switches()
        .iter()
        .any(|s| topo.switch_intfs(s).iter().any(|i| i == intf))
}

/// The whole sequence. `interact` gets the running network between release and teardown.
/// The network is torn down even if waiting or `interact` fails.
pub async fn run<F>(config: SessionConfig, runner: Box<dyn CommandRunner>, interact: F) -> Result<()>
where
    F: FnOnce(&Net) -> Result<()>,
{
    let session = Session::start(config, runner)?;
    let result = match session.wait_ready().await {
        Ok(_) => session.release().and_then(|_| interact(&session.net)),
        Err(e) => Err(e),
    };
    session.stop();
    result
}

//! Interactive shell on a running network.

use crate::error::Result;
use crate::net::Net;
use crate::ofctl::{OfCtl, OPENFLOW13};
use crate::runner::CommandOutput;
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::io::Write;
use std::path::Path;

const HELP: &str = "Commands:
  nodes                list hosts and switches
  net                  list links
  intfs                list interfaces of every node
  ports <switch>       OpenFlow port descriptions
  flows <switch>       installed flows
  pingall              ping between all hosts
  xterm <host>...      open a terminal inside hosts
  sh <cmd>             run a command on the machine
  <node> <cmd>         run a command on a node
  exit | quit          leave the shell and stop the network
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Nodes,
    Net,
    Intfs,
    Ports(String),
    Flows(String),
    PingAll,
    Xterm(Vec<String>),
    Sh(String),
    Node { node: String, cmd: String },
    Exit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        let (head, rest) = match line.find(char::is_whitespace) {
            Some(i) => (&line[..i], line[i..].trim()),
            None => (line, ""),
        };
        match (head, rest) {
            ("", _) => Command::Empty,
            ("help", _) | ("?", _) => Command::Help,
            ("nodes", "") => Command::Nodes,
            ("net", "") | ("links", "") => Command::Net,
            ("intfs", "") => Command::Intfs,
            ("ports", sw) if !sw.is_empty() => Command::Ports(sw.to_string()),
            ("flows", sw) if !sw.is_empty() => Command::Flows(sw.to_string()),
            ("pingall", "") => Command::PingAll,
            ("xterm", hosts) if !hosts.is_empty() => {
                Command::Xterm(hosts.split_whitespace().map(String::from).collect())
            }
            ("sh", cmd) if !cmd.is_empty() => Command::Sh(cmd.to_string()),
            ("exit", "") | ("quit", "") => Command::Exit,
            (node, cmd) if !cmd.is_empty() => Command::Node {
                node: node.to_string(),
                cmd: cmd.to_string(),
            },
            _ => Command::Unknown(line.to_string()),
        }
    }
}

pub struct Cli<'a> {
    net: &'a Net,
}

impl<'a> Cli<'a> {
    pub fn new(net: &'a Net) -> Cli<'a> {
        Cli { net }
    }

    /// Read commands until `exit`, Ctrl-C or Ctrl-D.
    pub fn run(&self, history: &Path) -> Result<()> {
        let mut rl = Editor::<()>::new()?;
        if rl.load_history(history).is_err() {
            info!("No previous history.");
        }
        let stdout = std::io::stdout();
        loop {
            match rl.readline("poctopo> ") {
                Ok(line) => {
                    rl.add_history_entry(line.as_str());
                    let mut out = stdout.lock();
                    if !self.execute(&Command::parse(&line), &mut out)? {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
        if let Err(e) = rl.save_history(history) {
            warn!("could not save history: {}", e);
        }
        Ok(())
    }

    /// Execute one command. Returns `false` when the shell should exit.
    pub fn execute(&self, cmd: &Command, out: &mut dyn Write) -> Result<bool> {
        let runner = self.net.runner();
        match cmd {
            Command::Empty => {}
            Command::Help => write!(out, "{}", HELP)?,
            Command::Exit => return Ok(false),
            Command::Nodes => {
                let hosts: Vec<&str> = self.net.host.iter().map(|h| h.name.as_str()).collect();
                let switches: Vec<&str> =
                    self.net.ovsswitch.iter().map(|s| s.name.as_str()).collect();
                writeln!(out, "available nodes are:")?;
                writeln!(out, "{} {}", hosts.join(" "), switches.join(" "))?;
            }
            Command::Net => {
                for link in self.net.links.iter() {
                    writeln!(out, "{}<->{}", link.one.name, link.two.name)?;
                }
            }
            Command::Intfs => {
                for h in self.net.host.iter() {
                    writeln!(out, "{}: {}", h.name, h.intfs.join(","))?;
                }
                for s in self.net.ovsswitch.iter() {
                    writeln!(out, "{}: {}", s.name, s.intf_names().join(","))?;
                }
            }
            Command::Ports(sw) | Command::Flows(sw) => {
                if self.net.get_switch(sw).is_none() {
                    writeln!(out, "*** Unknown switch: {}", sw)?;
                    return Ok(true);
                }
                let ofctl = OfCtl::new(runner, OPENFLOW13);
                let dump = match cmd {
                    Command::Ports(_) => ofctl.dump_ports_desc(sw),
                    _ => ofctl.dump_flows(sw),
                };
                match dump {
                    Ok(text) => write!(out, "{}", text)?,
                    Err(e) => writeln!(out, "*** {}", e)?,
                }
            }
            Command::PingAll => self.pingall(out)?,
            Command::Xterm(hosts) => {
                for name in hosts {
                    match self.net.get_host(name) {
                        Some(h) => spawn_xterm(&h.netns.name),
                        None => writeln!(out, "*** Unknown host: {}", name)?,
                    }
                }
            }
            Command::Sh(c) => print_output(out, runner.run(c))?,
            Command::Node { node, cmd: c } => {
                let o = if let Some(h) = self.net.get_host(node) {
                    h.cmd(runner, c)
                } else if self.net.get_switch(node).is_some() {
                    // switches live in the root namespace
                    runner.run(c)
                } else {
                    writeln!(out, "*** Unknown command: {} {}", node, c)?;
                    return Ok(true);
                };
                print_output(out, o)?;
            }
            Command::Unknown(line) => writeln!(out, "*** Unknown command: {}", line)?,
        }
        Ok(true)
    }

    fn pingall(&self, out: &mut dyn Write) -> Result<()> {
        let runner = self.net.runner();
        writeln!(out, "*** Ping: testing ping reachability")?;
        let mut sent = 0;
        let mut received = 0;
        for src in self.net.host.iter() {
            write!(out, "{} -> ", src.name)?;
            for dst in self.net.host.iter().filter(|d| d.name != src.name) {
                sent += 1;
                let ok = src
                    .cmd(runner, &format!("ping -c1 -W1 {}", dst.ip))
                    .map(|o| o.success)
                    .unwrap_or(false);
                if ok {
                    received += 1;
                    write!(out, "{} ", dst.name)?;
                } else {
                    write!(out, "X ")?;
                }
            }
            writeln!(out)?;
        }
        let dropped = if sent == 0 {
            0
        } else {
            100 * (sent - received) / sent
        };
        writeln!(
            out,
            "*** Results: {}% dropped ({}/{} received)",
            dropped, received, sent
        )?;
        Ok(())
    }
}

/// Command output, or the reason it could not run. Either way the shell goes on.
fn print_output(out: &mut dyn Write, o: Result<CommandOutput>) -> std::io::Result<()> {
    match o {
        Ok(o) => write!(out, "{}{}", o.stdout, o.stderr),
        Err(e) => writeln!(out, "*** {}", e),
    }
}

/// Open an xterm inside `netns` without waiting for it.
fn spawn_xterm(netns: &str) {
    let mut child = tokio::process::Command::new("ip");
    child.arg("netns").arg("exec").arg(netns).arg("xterm");
    match child.spawn() {
        Ok(mut child) => {
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
        }
        Err(e) => warn!("could not start xterm in {}: {}", netns, e),
    }
}

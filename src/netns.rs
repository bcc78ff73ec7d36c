use crate::error::Result;
use crate::runner::{run_logged, CommandOutput, CommandRunner};

/// Prefix of every namespace this program creates.
pub const NETNS_PREFIX: &str = "poc-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetNamespace {
    pub name: String,
}

impl NetNamespace {
    pub fn for_host(host: &str) -> NetNamespace {
        NetNamespace {
            name: format!("{}{}", NETNS_PREFIX, host),
        }
    }

    pub fn add(&self, runner: &dyn CommandRunner) -> Result<()> {
        let cmd = format!("ip netns add {}", self.name);
        runner.run(&cmd)?.into_result(&cmd)?;
        Ok(())
    }

    pub fn exists(&self, runner: &dyn CommandRunner) -> Result<bool> {
        let output = runner.run("ip netns list")?.stdout;
        Ok(output
            .lines()
            .filter_map(|l| l.split_whitespace().next())
            .any(|ns| ns == self.name))
    }

    pub fn get_or_add(&self, runner: &dyn CommandRunner) -> Result<()> {
        if !self.exists(runner)? {
            self.add(runner)?;
        }
        Ok(())
    }

    pub fn del(&self, runner: &dyn CommandRunner) {
        run_logged(runner, &format!("ip netns del {}", self.name), "del netns");
    }

    pub fn exec_shell(&self, runner: &dyn CommandRunner, cmd: &str) -> Result<CommandOutput> {
        runner.run(&self.wrap(cmd))
    }

    /// `cmd` prefixed so that it runs inside this namespace.
    pub fn wrap(&self, cmd: &str) -> String {
        format!("ip netns exec {} {}", self.name, cmd)
    }
}

//! Execution of external commands.
//!
//! Everything the emulator does to the host (namespaces, veth pairs, bridges, flow tables) goes
//! through a [`CommandRunner`], so the whole network can be driven against canned output.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use subprocess::Exec;

/// Captured result of one command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> CommandOutput {
        CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turn a non-zero exit into [`Error::CommandFailed`].
    pub fn into_result(self, cmd: &str) -> Result<CommandOutput> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                cmd: cmd.to_string(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

pub trait CommandRunner {
    /// Run `cmd` through the shell and wait for it to finish.
    fn run(&self, cmd: &str) -> Result<CommandOutput>;
}

/// Runs commands with `sh -c` on the local machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> Result<CommandOutput> {
        debug!("exec: {}", cmd);
        let data = Exec::shell(cmd).capture().map_err(|source| Error::Spawn {
            cmd: cmd.to_string(),
            source,
        })?;
        Ok(CommandOutput {
            success: data.success(),
            stdout: data.stdout_str(),
            stderr: data.stderr_str(),
        })
    }
}

/// Log a failed command without aborting.
pub fn handle_output(o: &CommandOutput, when: &str) {
    if !o.success {
        warn!("Err when {}: {}", when, o.stderr.trim());
    }
}

/// Run a command whose failure is not fatal. Spawn errors are logged the same way.
pub fn run_logged(runner: &dyn CommandRunner, cmd: &str, when: &str) -> CommandOutput {
    match runner.run(cmd) {
        Ok(o) => {
            handle_output(&o, when);
            o
        }
        Err(e) => {
            warn!("Err when {}: {}", when, e);
            CommandOutput::failed(e.to_string())
        }
    }
}

#[derive(Default)]
struct Script {
    responses: Vec<(String, CommandOutput)>,
    refused: Vec<String>,
    history: Vec<String>,
}

/// A runner answering from a table of canned outputs, keyed by command prefix.
///
/// The most recently registered matching prefix wins; unmatched commands succeed with empty
/// output. Every command is recorded. Clones share the same table and history.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    script: Rc<RefCell<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> ScriptedRunner {
        ScriptedRunner::default()
    }

    pub fn respond(&self, prefix: &str, output: CommandOutput) {
        self.script
            .borrow_mut()
            .responses
            .push((prefix.to_string(), output));
    }

    pub fn respond_ok(&self, prefix: &str, stdout: &str) {
        self.respond(prefix, CommandOutput::ok(stdout))
    }

    /// Commands starting with `prefix` fail to spawn, as if the program were not installed.
    pub fn refuse(&self, prefix: &str) {
        self.script.borrow_mut().refused.push(prefix.to_string());
    }

    /// All commands run so far, in order.
    pub fn history(&self) -> Vec<String> {
        self.script.borrow().history.clone()
    }

    pub fn ran(&self, cmd: &str) -> bool {
        self.script.borrow().history.iter().any(|c| c == cmd)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &str) -> Result<CommandOutput> {
        let mut script = self.script.borrow_mut();
        script.history.push(cmd.to_string());
        if script.refused.iter().any(|p| cmd.starts_with(p.as_str())) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", cmd),
            )));
        }
        let output = script
            .responses
            .iter()
            .rev()
            .find(|(prefix, _)| cmd.starts_with(prefix.as_str()))
            .map(|(_, o)| o.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}

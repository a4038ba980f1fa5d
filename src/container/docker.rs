//! Docker CLI backed implementations of the container traits.

use super::{ContainerRuntime, ContainerSpec, DaemonLauncher};
use crate::utils::command::{CommandError, CommandLine};
use std::path::Path;

/// Container runtime driven through the `docker` command line
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn run_command(&self, spec: &ContainerSpec) -> CommandLine {
        let mut cmd = CommandLine::new(&self.program).args(["run", "--detach", "--tty", "--rm"]);
        for capability in &spec.capabilities {
            cmd = cmd.arg(format!("--cap-add={}", capability));
        }
        cmd = cmd.args(["--name", spec.name.as_str()]);
        if let Some((host, mount_point)) = &spec.volume {
            cmd = cmd.arg(format!("--volume={}:{}", host.display(), mount_point));
        }
        cmd.arg(&spec.image)
    }

    pub fn exec_command(&self, container: &str, command: &[&str]) -> CommandLine {
        CommandLine::new(&self.program)
            .args(["exec", container])
            .args(command.iter().copied())
    }

    pub fn copy_command(&self, container: &str, source: &Path, destination: &str) -> CommandLine {
        CommandLine::new(&self.program)
            .arg("cp")
            .arg(source.display().to_string())
            .arg(format!("{}:{}", container, destination))
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerRuntime for DockerCli {
    fn run(&mut self, spec: &ContainerSpec) -> Result<(), CommandError> {
        self.run_command(spec).run()
    }

    fn exec(&mut self, container: &str, command: &[&str]) -> Result<(), CommandError> {
        self.exec_command(container, command).run()
    }

    fn copy_into(&mut self, container: &str, source: &Path, destination: &str) -> Result<(), CommandError> {
        self.copy_command(container, source, destination).run()
    }
}

/// Starts `nebula` detached inside a container through `docker exec`
#[derive(Debug, Clone)]
pub struct NebulaLauncher {
    runtime: String,
    daemon: String,
}

impl NebulaLauncher {
    pub fn new(runtime: impl Into<String>, daemon: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            daemon: daemon.into(),
        }
    }

    pub fn launch_command(&self, container: &str, config_path: &str) -> CommandLine {
        CommandLine::new(&self.runtime)
            .args(["exec", "--detach", container])
            .args([self.daemon.as_str(), "-config", config_path])
    }
}

impl DaemonLauncher for NebulaLauncher {
    fn launch(&mut self, container: &str, config_path: &str) -> Result<(), CommandError> {
        self.launch_command(container, config_path).run()
    }
}

//! Container manager backed by the `docker` or `podman` command line.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::containers::manager::{
    ContainerError, ContainerInfo, ContainerManager, ExecSession, ImageBuildConfig, LogStream,
    Result, WorkloadDescriptor,
};

const LOG_PIPE_CAPACITY: usize = 64 * 1024;
const LOG_CHUNK_SIZE: usize = 4096;

/// Drives a container engine through its CLI.
#[derive(Debug, Clone)]
pub struct CliContainerManager {
    binary: String,
}

impl CliContainerManager {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn exec(&self, args: &[String]) -> Result<String> {
        debug!(
            "Running {} {}",
            self.binary,
            args.first().map(String::as_str).unwrap_or_default()
        );
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.to_lowercase().contains("no such") {
            Err(ContainerError::NotFound(stderr))
        } else {
            Err(ContainerError::Engine(format!(
                "{} {} exited with {}: {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr
            )))
        }
    }
}

/// Arguments for `<engine> create`.
pub fn create_args(config: &WorkloadDescriptor) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), config.name.clone()];

    for (container_port, host_port) in &config.ports {
        args.push("-p".to_string());
        if host_port.is_empty() {
            args.push(container_port.clone());
        } else {
            args.push(format!("{}:{}", host_port, container_port));
        }
    }
    for (key, value) in &config.environment {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (source, target) in &config.volumes {
        args.push("-v".to_string());
        args.push(format!("{}:{}", source, target));
    }
    // Additional networks are attached after create
    if let Some(network) = config.networks.first() {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    if let Some(policy) = &config.restart_policy {
        args.push("--restart".to_string());
        args.push(policy.clone());
    }
    if let Some(dir) = &config.working_dir {
        args.push("-w".to_string());
        args.push(dir.clone());
    }
    for (key, value) in &config.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    if config.auto_remove {
        args.push("--rm".to_string());
    }
    if let Some(entrypoint) = config.entrypoint.first() {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }

    args.push(config.image.clone());
    args.extend(config.entrypoint.iter().skip(1).cloned());
    args.extend(config.command.iter().cloned());
    args
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
}

/// Parse one line of `ps --format '{{json .}}'`.
fn parse_ps_line(line: &str) -> Result<ContainerInfo> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ContainerError::Parse(e.to_string()))?;

    // podman reports Names as an array
    let name = match value.get("Names") {
        Some(Value::Array(names)) => names
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(names)) => names.split(',').next().unwrap_or_default().to_string(),
        _ => String::new(),
    };
    let ports = match value.get("Ports") {
        Some(Value::String(ports)) if !ports.is_empty() => {
            ports.split(", ").map(str::to_string).collect()
        }
        _ => Vec::new(),
    };

    Ok(ContainerInfo {
        id: str_field(&value, &["ID", "Id"]).to_string(),
        name,
        image: str_field(&value, &["Image"]).to_string(),
        state: str_field(&value, &["State"]).to_lowercase(),
        status: str_field(&value, &["Status"]).to_string(),
        ports,
    })
}

/// Parse the first element of `inspect --type container` output.
fn parse_inspect(output: &str) -> Result<ContainerInfo> {
    let value: Value =
        serde_json::from_str(output).map_err(|e| ContainerError::Parse(e.to_string()))?;
    let container = value
        .as_array()
        .and_then(|items| items.first())
        .ok_or_else(|| ContainerError::Parse("empty inspect output".to_string()))?;

    let state = &container["State"];
    let state_name = str_field(state, &["Status"]).to_lowercase();
    let status = if state.get("Running").and_then(Value::as_bool).unwrap_or(false) {
        "Up".to_string()
    } else if state_name == "exited" {
        format!(
            "Exited ({})",
            state.get("ExitCode").and_then(Value::as_i64).unwrap_or_default()
        )
    } else {
        state_name.clone()
    };

    let mut ports = Vec::new();
    if let Some(bindings) = container["NetworkSettings"]["Ports"].as_object() {
        for (container_port, hosts) in bindings {
            for host in hosts.as_array().into_iter().flatten() {
                ports.push(format!(
                    "{}:{}->{}",
                    str_field(host, &["HostIp"]),
                    str_field(host, &["HostPort"]),
                    container_port
                ));
            }
        }
    }

    Ok(ContainerInfo {
        id: str_field(container, &["Id", "ID"]).to_string(),
        name: str_field(container, &["Name"]).trim_start_matches('/').to_string(),
        image: str_field(&container["Config"], &["Image"]).to_string(),
        state: state_name,
        status,
        ports,
    })
}

async fn pump<R: AsyncRead + Unpin>(mut source: R, sink: &Mutex<DuplexStream>) {
    let mut buf = vec![0u8; LOG_CHUNK_SIZE];
    loop {
        match source.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => {
                if sink.lock().await.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Log pipe read failed: {}", e);
                return;
            }
        }
    }
}

#[async_trait]
impl ContainerManager for CliContainerManager {
    fn engine(&self) -> &str {
        &self.binary
    }

    async fn create(&self, config: &WorkloadDescriptor) -> Result<String> {
        let id = self.exec(&create_args(config)).await?;
        for network in config.networks.iter().skip(1) {
            self.exec(&["network".into(), "connect".into(), network.clone(), id.clone()])
                .await?;
        }
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.exec(&["start".into(), id.into()]).await.map(|_| ())
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.exec(&["stop".into(), id.into()]).await.map(|_| ())
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.exec(&["restart".into(), id.into()]).await.map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.exec(&["rm".into(), "-f".into(), id.into()]).await.map(|_| ())
    }

    async fn wait(&self, id: &str) -> Result<i64> {
        let output = self.exec(&["wait".into(), id.into()]).await?;
        output
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| ContainerError::Parse(format!("exit code '{}'", output)))
    }

    async fn stream_logs(&self, id: &str, follow: bool) -> Result<LogStream> {
        let mut args = vec!["logs".to_string()];
        if follow {
            args.push("--follow".to_string());
        }
        args.push(id.to_string());

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ContainerError::Engine("log stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ContainerError::Engine("log stderr not captured".to_string()))?;

        let (reader, writer) = tokio::io::duplex(LOG_PIPE_CAPACITY);
        tokio::spawn(async move {
            let writer = Mutex::new(writer);
            tokio::join!(pump(stdout, &writer), pump(stderr, &writer));
            drop(writer);
            if let Err(e) = child.wait().await {
                warn!("Failed to reap log process: {}", e);
            }
        });

        Ok(Box::pin(reader))
    }

    async fn exec_interactive(
        &self,
        id: &str,
        command: &[String],
        session: ExecSession,
    ) -> Result<()> {
        let ExecSession {
            mut stdin,
            mut stdout,
            mut stderr,
            resize,
        } = session;

        let mut child = Command::new(&self.binary)
            .arg("exec")
            .arg("-i")
            .arg(id)
            .args(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| ContainerError::Engine("exec stdin not captured".to_string()))?;
        let mut child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| ContainerError::Engine("exec stdout not captured".to_string()))?;
        let mut child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| ContainerError::Engine("exec stderr not captured".to_string()))?;

        // The CLI has no resize channel without a TTY; drain requests so senders never block
        if let Some(mut resize) = resize {
            tokio::spawn(async move {
                while let Some(size) = resize.recv().await {
                    debug!("Ignoring terminal resize to {}x{}", size.cols, size.rows);
                }
            });
        }

        let input = async {
            let _ = tokio::io::copy(&mut stdin, &mut child_stdin).await;
            drop(child_stdin);
        };
        let (_, out, err) = tokio::join!(
            input,
            tokio::io::copy(&mut child_stdout, &mut stdout),
            tokio::io::copy(&mut child_stderr, &mut stderr),
        );
        out?;
        err?;

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(ContainerError::Engine(format!("exec exited with {}", status)))
        }
    }

    async fn list(&self) -> Result<Vec<ContainerInfo>> {
        let output = self
            .exec(&[
                "ps".into(),
                "-a".into(),
                "--no-trunc".into(),
                "--format".into(),
                "{{json .}}".into(),
            ])
            .await?;
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_ps_line)
            .collect()
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        let output = self
            .exec(&["inspect".into(), "--type".into(), "container".into(), id.into()])
            .await?;
        parse_inspect(&output)
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        let present = self
            .exec(&["image".into(), "inspect".into(), reference.into()])
            .await;
        match present {
            Ok(_) => Ok(()),
            Err(ContainerError::NotFound(_)) | Err(ContainerError::Engine(_)) => self
                .exec(&["pull".into(), reference.into()])
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        }
    }

    async fn build_image(&self, config: &ImageBuildConfig) -> Result<()> {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            config.dockerfile.clone(),
        ];
        for (key, value) in &config.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push("-t".to_string());
        args.push(config.tag.clone());
        args.push(config.context_dir.clone());
        self.exec(&args).await.map(|_| ())
    }
}

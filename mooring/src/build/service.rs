//! Runs builds inside disposable helper containers

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::build::script::render_build_script;
use crate::build::types::{BuildResult, BuildSpec, LogSink};
use crate::containers::manager::{ContainerManager, LogStream, WorkloadDescriptor};
use crate::errors::EngineError;
use crate::storage::settings::BuilderSettings;

const LOG_CHUNK_SIZE: usize = 4096;

/// Mount point of the host engine socket inside the helper
pub const HELPER_SOCKET_PATH: &str = "/var/run/docker.sock";

pub fn helper_name(build_id: &str) -> String {
    format!("mooring-build-{}", build_id)
}

/// Builds images by running a strategy's commands in a helper container
/// that talks to the host engine through its socket.
pub struct BuildExecutor {
    containers: Arc<dyn ContainerManager>,
    settings: BuilderSettings,
    socket_path: String,
}

impl BuildExecutor {
    pub fn new(
        containers: Arc<dyn ContainerManager>,
        settings: BuilderSettings,
        socket_path: impl Into<String>,
    ) -> Self {
        Self {
            containers,
            settings,
            socket_path: socket_path.into(),
        }
    }

    /// Container configuration of the helper for `spec`.
    pub fn helper_descriptor(&self, spec: &BuildSpec) -> Result<WorkloadDescriptor, EngineError> {
        let buildpack = spec.buildpack.normalized()?;
        let strategy = buildpack.strategy();
        let commands = strategy.commands(&spec.image_tag);
        let script = render_build_script(
            &spec.git_repo,
            spec.git_branch.as_deref(),
            spec.context_root.as_deref(),
            &commands,
        );

        let mut environment = BTreeMap::new();
        environment.insert("GIT_REPO".to_string(), spec.git_repo.clone());
        environment.insert(
            "GIT_BRANCH".to_string(),
            spec.git_branch.clone().unwrap_or_default(),
        );
        environment.insert(
            "CONTEXT_ROOT".to_string(),
            spec.context_root.clone().unwrap_or_default(),
        );
        environment.insert("IMAGE_TAG".to_string(), spec.image_tag.clone());
        environment.insert("BUILD_ID".to_string(), spec.id.clone());
        for (key, value) in &spec.environment {
            environment.insert(key.clone(), value.clone());
        }

        let mut volumes = BTreeMap::new();
        volumes.insert(self.socket_path.clone(), HELPER_SOCKET_PATH.to_string());

        Ok(WorkloadDescriptor {
            image: strategy.helper_image(&self.settings),
            name: helper_name(&spec.id),
            environment,
            volumes,
            working_dir: Some("/workspace".to_string()),
            entrypoint: vec!["/bin/sh".to_string()],
            command: vec!["-c".to_string(), script],
            auto_remove: true,
            ..Default::default()
        })
    }

    /// Build `spec` and wait for the helper to exit.
    ///
    /// A helper that exits non-zero is reported as an unsuccessful
    /// [`BuildResult`]. Only failing to launch the helper is an error.
    pub async fn build_image(&self, spec: &BuildSpec) -> Result<BuildResult, EngineError> {
        let helper = self.helper_descriptor(spec)?;
        info!(
            build_id = %spec.id,
            buildpack = spec.buildpack.kind(),
            image_tag = %spec.image_tag,
            helper_image = %helper.image,
            "Starting build"
        );

        self.containers
            .pull_image(&helper.image)
            .await
            .map_err(|e| {
                EngineError::BuildError(format!(
                    "failed to pull build helper image {}: {}",
                    helper.image, e
                ))
            })?;

        let helper_id = self.containers.create(&helper).await.map_err(|e| {
            EngineError::BuildError(format!("failed to create build helper: {}", e))
        })?;
        debug!(build_id = %spec.id, helper_id = %helper_id, "Created build helper");

        if let Err(e) = self.containers.start(&helper_id).await {
            self.discard_helper(&helper_id).await;
            return Err(EngineError::BuildError(format!(
                "failed to start build helper: {}",
                e
            )));
        }

        let stream = match self.containers.stream_logs(&helper_id, true).await {
            Ok(stream) => stream,
            Err(e) => {
                self.discard_helper(&helper_id).await;
                return Err(EngineError::BuildError(format!(
                    "failed to stream build logs: {}",
                    e
                )));
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        let sink = spec.log_sink.clone();
        tokio::spawn(async move {
            let logs = collect_logs(stream, sink).await;
            let _ = done_tx.send(logs);
        });

        let exit = self.containers.wait(&helper_id).await;
        let build_logs = match done_rx.await {
            Ok(logs) => logs,
            Err(_) => {
                error!(build_id = %spec.id, "Build log reader exited without reporting");
                String::new()
            }
        };

        let error = match exit {
            Ok(0) => None,
            Ok(code) => Some(format!("build failed with exit code {}", code)),
            Err(e) => Some(format!("failed to wait for build helper: {}", e)),
        };

        match &error {
            None => info!(build_id = %spec.id, image_tag = %spec.image_tag, "Build succeeded"),
            Some(e) => warn!(build_id = %spec.id, "Build failed: {}", e),
        }

        Ok(BuildResult {
            success: error.is_none(),
            image_tag: spec.image_tag.clone(),
            build_logs,
            error,
        })
    }

    /// Best-effort removal of a helper that will not be waited on.
    async fn discard_helper(&self, helper_id: &str) {
        if let Err(e) = self.containers.delete(helper_id).await {
            warn!(helper_id = %helper_id, "Failed to remove build helper: {}", e);
        }
    }
}

/// Incremental UTF-8 decoding of a byte stream.
///
/// A character split across two reads is held back until its remaining bytes
/// arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        let remaining = rest.to_vec();
        self.pending = remaining;
        text
    }

    /// Bytes left at end of stream, decoded lossily.
    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Read `stream` to the end, forwarding decoded text to `sink` before reading
/// the next chunk.
async fn collect_logs(mut stream: LogStream, sink: Option<LogSink>) -> String {
    let mut logs = String::new();
    let mut decoder = Utf8Decoder::default();
    let mut buf = vec![0u8; LOG_CHUNK_SIZE];
    loop {
        let text = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => decoder.push(&buf[..n]),
            Err(e) => {
                warn!("Error reading build logs: {}", e);
                break;
            }
        };
        forward(&mut logs, &sink, text).await;
    }
    let tail = decoder.finish();
    forward(&mut logs, &sink, tail).await;
    logs
}

async fn forward(logs: &mut String, sink: &Option<LogSink>, text: String) {
    if text.is_empty() {
        return;
    }
    logs.push_str(&text);
    if let Some(sink) = sink {
        sink(text).await;
    }
}

//! Build executor tests

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;

use mooring::build::service::BuildExecutor;
use mooring::build::strategy::BuildStrategy;
use mooring::build::types::{BuildSpec, BuildpackConfig, DockerfileConfig, LogSink};
use mooring::containers::manager::ContainerManager;
use mooring::containers::mock::MockContainerManager;
use mooring::errors::EngineError;
use mooring::storage::settings::BuilderSettings;

fn dockerfile_spec(buildpack: BuildpackConfig) -> BuildSpec {
    BuildSpec {
        id: "build-1".to_string(),
        git_repo: "https://example.com/acme/shop.git".to_string(),
        git_branch: Some("main".to_string()),
        context_root: None,
        buildpack,
        environment: BTreeMap::new(),
        image_tag: "shop:1".to_string(),
        log_sink: None,
    }
}

fn executor(mock: Arc<MockContainerManager>) -> BuildExecutor {
    BuildExecutor::new(mock, BuilderSettings::default(), "/var/run/docker.sock")
}

#[test]
fn test_dockerfile_command_is_exact() {
    let mut build_args = BTreeMap::new();
    build_args.insert("NODE_ENV".to_string(), "production".to_string());
    let config = DockerfileConfig {
        dockerfile_path: "docker/Dockerfile.prod".to_string(),
        build_args,
        target: Some("runner".to_string()),
    };

    let commands = config.commands("shop:7");
    assert_eq!(
        commands.last().unwrap(),
        "docker build -f docker/Dockerfile.prod --build-arg NODE_ENV=production --target runner -t shop:7 ."
    );
}

#[tokio::test]
async fn test_helper_runs_rendered_script() {
    let mock = Arc::new(MockContainerManager::new());
    let builder = executor(mock.clone());

    let result = builder
        .build_image(&dockerfile_spec(BuildpackConfig::Dockerfile(
            DockerfileConfig::default(),
        )))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.image_tag, "shop:1");

    let created = mock.created().await;
    assert_eq!(created.len(), 1);
    let helper = &created[0];
    assert_eq!(helper.name, "mooring-build-build-1");
    assert_eq!(helper.image, BuilderSettings::default().docker_image);
    assert!(helper.auto_remove);
    assert_eq!(
        helper.volumes.get("/var/run/docker.sock").map(String::as_str),
        Some("/var/run/docker.sock")
    );
    assert_eq!(helper.environment.get("IMAGE_TAG").map(String::as_str), Some("shop:1"));
    assert_eq!(helper.entrypoint, vec!["/bin/sh".to_string()]);
    let script = &helper.command[1];
    assert!(script.starts_with("set -e"));
    assert!(script.contains("git clone -b main https://example.com/acme/shop.git /workspace/source"));
    assert!(script.contains("docker build -f Dockerfile -t shop:1 ."));

    // auto-removed helper is gone after exit
    assert!(mock.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_zero_exit_is_unsuccessful_result() {
    let mock = Arc::new(MockContainerManager::new());
    mock.set_exit_code(2);
    mock.set_log_output("step 1\nboom\n").await;

    let chunks = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink_chunks = chunks.clone();
    let sink: LogSink = Arc::new(move |chunk: String| {
        let chunks = sink_chunks.clone();
        async move {
            chunks.lock().await.push(chunk);
        }
        .boxed()
    });

    let mut spec = dockerfile_spec(BuildpackConfig::default());
    spec.log_sink = Some(sink);

    let result = executor(mock).build_image(&spec).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("build failed with exit code 2"));
    assert_eq!(result.build_logs, "step 1\nboom\n");
    assert_eq!(chunks.lock().await.concat(), "step 1\nboom\n");
}

fn collecting_sink() -> (LogSink, Arc<Mutex<Vec<String>>>) {
    let chunks = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink_chunks = chunks.clone();
    let sink: LogSink = Arc::new(move |chunk: String| {
        let chunks = sink_chunks.clone();
        async move {
            chunks.lock().await.push(chunk);
        }
        .boxed()
    });
    (sink, chunks)
}

#[tokio::test]
async fn test_sink_keeps_character_split_across_reads() {
    let mock = Arc::new(MockContainerManager::new());
    // the two bytes of 'é' straddle the first 4096-byte read
    let output = format!("{}é\n", "a".repeat(4095));
    mock.set_log_output(output.clone()).await;

    let (sink, chunks) = collecting_sink();
    let mut spec = dockerfile_spec(BuildpackConfig::default());
    spec.log_sink = Some(sink);

    let result = executor(mock).build_image(&spec).await.unwrap();
    assert_eq!(result.build_logs, output);
    let persisted = chunks.lock().await.concat();
    assert_eq!(persisted, output);
    assert!(!persisted.contains('\u{fffd}'));
}

#[tokio::test]
async fn test_log_attach_failure_is_error_and_cleans_up() {
    let mock = Arc::new(MockContainerManager::new());
    mock.fail_logs.store(true, Ordering::SeqCst);

    let err = executor(mock.clone())
        .build_image(&dockerfile_spec(BuildpackConfig::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BuildError(_)));
    assert_eq!(mock.deleted().await.len(), 1);
    assert!(mock.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_helper_start_failure_is_error_and_cleans_up() {
    let mock = Arc::new(MockContainerManager::new());
    mock.fail_start.store(true, Ordering::SeqCst);

    let err = executor(mock.clone())
        .build_image(&dockerfile_spec(BuildpackConfig::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BuildError(_)));
    assert_eq!(mock.deleted().await.len(), 1);
}

#[tokio::test]
async fn test_pull_failure_is_error() {
    let mock = Arc::new(MockContainerManager::new());
    mock.fail_pull.store(true, Ordering::SeqCst);

    let err = executor(mock.clone())
        .build_image(&dockerfile_spec(BuildpackConfig::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BuildError(_)));
    assert!(mock.created().await.is_empty());
}

//! ビルドしたイメージをローカルでサービスとして起動

use crate::backend::ServiceSpec;
use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::container::{Config, CreateContainerOptions, LogOutput};
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use colored::Colorize;
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// ServiceSpec を Docker のコンテナ設定に変換
#[allow(deprecated)]
pub fn service_to_container_config(
    reference: &str,
    spec: &ServiceSpec,
) -> (Config<String>, CreateContainerOptions<String>) {
    let env: Vec<String> = spec
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();
    for (host, container) in &spec.ports {
        let container_port = format!("{}/tcp", container);
        exposed_ports.insert(container_port.clone(), HashMap::new());
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host.to_string()),
            }]),
        );
    }

    let host_config = Some(HostConfig {
        port_bindings: Some(port_bindings),
        restart_policy: Some(RestartPolicy {
            name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
            maximum_retry_count: None,
        }),
        ..Default::default()
    });

    let mut labels = HashMap::new();
    labels.insert("boltship.service".to_string(), spec.name.clone());
    labels.insert("boltship.image".to_string(), reference.to_string());

    let config = Config {
        image: Some(reference.to_string()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config,
        labels: Some(labels),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: spec.name.clone(),
        platform: None,
    };

    (config, options)
}

pub struct ContainerRunner {
    docker: Docker,
}

impl ContainerRunner {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// コンテナを作成して起動し、コンテナ ID を返す
    ///
    /// 同名のコンテナが既にある場合は削除してから作り直します。
    pub async fn start(&self, reference: &str, spec: &ServiceSpec) -> BuildResult<String> {
        let run_failed = |message: String| BuildError::RunFailed {
            name: spec.name.clone(),
            message,
        };

        match self
            .docker
            .remove_container(
                &spec.name,
                Some(bollard::query_parameters::RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(_) => println!("  ℹ 既存のコンテナを置き換えます: {}", spec.name.cyan()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(run_failed(e.to_string())),
        }

        let (config, options) = service_to_container_config(reference, spec);

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| run_failed(format!("コンテナ作成に失敗: {}", e)))?;
        tracing::debug!("Created container {} ({})", spec.name, response.id);

        self.docker
            .start_container(
                &response.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(|e| run_failed(format!("コンテナ起動に失敗: {}", e)))?;

        tracing::info!("Started service {} from {}", spec.name, reference);
        Ok(response.id)
    }

    /// ログを追跡（コンテナ停止でストリームが終わるまで）
    pub async fn follow_logs(&self, name: &str) -> BuildResult<()> {
        #[allow(deprecated)]
        let options = bollard::container::LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "100".to_string(),
            ..Default::default()
        };

        let mut log_stream = self.docker.logs(name, Some(options));
        let prefix = format!("[{}]", name).cyan();

        while let Some(log) = log_stream.next().await {
            let output = log.map_err(|e| BuildError::RunFailed {
                name: name.to_string(),
                message: format!("ログ取得エラー: {}", e),
            })?;

            match output {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    for line in String::from_utf8_lossy(&message).lines() {
                        println!("{} {}", prefix, line);
                    }
                }
                LogOutput::StdErr { message } => {
                    for line in String::from_utf8_lossy(&message).lines() {
                        println!("{} {} {}", prefix, "stderr:".red(), line);
                    }
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        Ok(())
    }
}

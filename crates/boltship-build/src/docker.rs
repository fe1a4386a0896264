//! Docker Engine をバックエンドにした ImageBackend 実装

use crate::auth::{RegistryAuth, login_credentials};
use crate::backend::{AssembledImage, ImageBackend, RegistryLogin, ServiceSpec};
use crate::builder::ImageBuilder;
use crate::error::{BuildError, BuildResult};
use crate::pusher::ImagePusher;
use crate::runner::ContainerRunner;
use async_trait::async_trait;
use bollard::Docker;

pub struct DockerBackend {
    docker: Docker,
    auth: RegistryAuth,
    verbose: bool,
}

impl DockerBackend {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::new(),
            verbose: false,
        }
    }

    /// ローカルの Docker デーモンに接続し、疎通を確認
    pub async fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        tracing::debug!("Connected to Docker daemon");
        Ok(Self::new(docker))
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn runner(&self) -> ContainerRunner {
        ContainerRunner::new(self.docker.clone())
    }
}

#[async_trait]
impl ImageBackend for DockerBackend {
    fn name(&self) -> &str {
        "docker"
    }

    async fn export(
        &self,
        image: &AssembledImage,
        reference: &str,
        no_cache: bool,
    ) -> BuildResult<()> {
        let builder = ImageBuilder::new(self.docker.clone()).verbose(self.verbose);

        builder
            .build_image(
                image.context.data.clone(),
                &image.dockerfile_name,
                reference,
                no_cache,
            )
            .await
            .map_err(|e| BuildError::ExportFailed {
                reference: reference.to_string(),
                message: e.to_string(),
            })
    }

    async fn publish(&self, reference: &str, login: Option<&RegistryLogin>) -> BuildResult<String> {
        let builder = ImageBuilder::new(self.docker.clone());
        let exists = builder
            .image_exists(reference)
            .await
            .map_err(|e| BuildError::PushFailed {
                message: e.to_string(),
            })?;
        if !exists {
            return Err(BuildError::PushFailed {
                message: format!("image {} has not been exported", reference),
            });
        }

        let credentials = match login {
            Some(login) => Some(login_credentials(login)),
            None => self.auth.get_credentials(reference)?,
        };

        ImagePusher::new(self.docker.clone())
            .push(reference, credentials)
            .await
    }

    async fn serve(&self, reference: &str, service: &ServiceSpec) -> BuildResult<String> {
        self.runner().start(reference, service).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltship_config::Secret;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_publish_connection_error_is_push_failure() {
        let docker = Docker::connect_with_unix(
            "/nonexistent/boltship-docker.sock",
            5,
            bollard::API_DEFAULT_VERSION,
        )
        .unwrap();
        let backend = DockerBackend::new(docker);
        let login = RegistryLogin {
            registry: "docker.io".to_string(),
            username: "acme".to_string(),
            password: Secret::new("registry-password", "pw"),
        };

        let err = backend
            .publish("acme/bot:latest", Some(&login))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::PushFailed { .. }));
    }
}

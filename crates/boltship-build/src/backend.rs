//! ビルドバックエンドの抽象化
//!
//! パイプラインはこのトレイト越しにイメージのエクスポート・プッシュ・起動を
//! 依頼します。Docker Engine 実装は [`crate::docker::DockerBackend`]。

use crate::context::{ContextArchive, ContextBuilder, ContextFilter, GENERATED_DOCKERFILE};
use crate::error::BuildResult;
use crate::recipe::ImageRecipe;
use async_trait::async_trait;
use boltship_config::Secret;
use std::path::{Path, PathBuf};

/// バックエンドに渡す組み立て済みイメージ
#[derive(Debug, Clone)]
pub struct AssembledImage {
    /// コンテキスト内の Dockerfile のパス
    pub dockerfile_name: String,
    pub context: ContextArchive,
    pub exposed_ports: Vec<u16>,
}

impl AssembledImage {
    pub fn files(&self) -> &[PathBuf] {
        &self.context.files
    }
}

/// 手順とソースツリーからイメージを組み立てる
pub fn assemble(
    recipe: &ImageRecipe,
    source_dir: &Path,
    filter: &ContextFilter,
) -> BuildResult<AssembledImage> {
    recipe.validate()?;

    let dockerfile = recipe.to_dockerfile();
    tracing::debug!("Generated Dockerfile:\n{}", dockerfile);
    let context = ContextBuilder::create_context(
        source_dir,
        filter,
        &dockerfile,
        &recipe.source_files(),
    )?;

    Ok(AssembledImage {
        dockerfile_name: GENERATED_DOCKERFILE.to_string(),
        context,
        exposed_ports: recipe.exposed_ports(),
    })
}

/// 明示的なレジストリ認証情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLogin {
    /// レジストリのホスト（例: docker.io, ghcr.io）
    pub registry: String,
    pub username: String,
    pub password: Secret,
}

/// 長時間稼働サービスとして起動する設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub env: Vec<(String, String)>,
    /// (host, container)
    pub ports: Vec<(u16, u16)>,
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// バックエンド名（ログ表示用）
    fn name(&self) -> &str;

    /// イメージを構築して `reference` として保存
    async fn export(
        &self,
        image: &AssembledImage,
        reference: &str,
        no_cache: bool,
    ) -> BuildResult<()>;

    /// エクスポート済みのイメージをプッシュし、プッシュ先のアドレスを返す
    ///
    /// `login` が None の場合はバックエンド既定の認証情報を使います。
    async fn publish(&self, reference: &str, login: Option<&RegistryLogin>) -> BuildResult<String>;

    /// イメージをサービスとして起動し、コンテナ ID を返す
    async fn serve(&self, reference: &str, service: &ServiceSpec) -> BuildResult<String>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! テスト用のバックエンド

    use super::*;
    use crate::error::BuildError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Export(String),
        Publish(String, Option<RegistryLogin>),
        Serve(String, ServiceSpec),
    }

    #[derive(Default)]
    pub struct FakeBackend {
        pub calls: Mutex<Vec<Call>>,
        pub fail_export: bool,
        pub fail_publish: bool,
    }

    impl FakeBackend {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn published(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Publish(reference, _) => Some(reference),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ImageBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn export(
            &self,
            _image: &AssembledImage,
            reference: &str,
            _no_cache: bool,
        ) -> BuildResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Export(reference.to_string()));
            if self.fail_export {
                return Err(BuildError::ExportFailed {
                    reference: reference.to_string(),
                    message: "engine unavailable".to_string(),
                });
            }
            Ok(())
        }

        async fn publish(
            &self,
            reference: &str,
            login: Option<&RegistryLogin>,
        ) -> BuildResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Publish(reference.to_string(), login.cloned()));
            if self.fail_publish {
                return Err(BuildError::PushFailed {
                    message: "unauthorized".to_string(),
                });
            }
            let (image, tag) = crate::pusher::split_image_tag(reference);
            Ok(crate::pusher::pushed_address(&image, &tag, Some("sha256:abc")))
        }

        async fn serve(&self, reference: &str, service: &ServiceSpec) -> BuildResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Serve(reference.to_string(), service.clone()));
            Ok("container-1".to_string())
        }
    }
}

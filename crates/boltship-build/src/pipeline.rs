//! build / run / publish の各操作
//!
//! いずれもイメージを組み立ててエクスポートした後、操作ごとの後処理
//! （条件付きプッシュ、サービス起動、認証付きプッシュ）を行う一本道の処理です。

use crate::auth::extract_registry;
use crate::backend::{AssembledImage, ImageBackend, RegistryLogin, ServiceSpec, assemble};
use crate::context::ContextFilter;
use crate::error::{BuildError, BuildResult};
use crate::recipe::ImageRecipe;
use boltship_config::{BuildSettings, PublishSettings, RunSettings};
use colored::Colorize;
use std::path::Path;

/// build 操作の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// エクスポートしたイメージ参照
    pub reference: String,
    /// プッシュした場合はレジストリ上のアドレス
    pub published: Option<String>,
}

async fn assemble_and_export(
    backend: &dyn ImageBackend,
    recipe: &ImageRecipe,
    source_dir: &Path,
    reference: &str,
    no_cache: bool,
) -> BuildResult<AssembledImage> {
    let image = assemble(recipe, source_dir, &ContextFilter::default())?;
    tracing::info!(
        "Assembled {} files from {} ({} backend)",
        image.files().len(),
        source_dir.display(),
        backend.name()
    );

    backend.export(&image, reference, no_cache).await?;
    Ok(image)
}

/// イメージをビルドしてエクスポートし、設定に応じてプッシュ
///
/// プッシュは PUSH_TO_REGISTRY が有効かつレジストリが指定されている場合のみ。
pub async fn build(
    backend: &dyn ImageBackend,
    settings: &BuildSettings,
    recipe: &ImageRecipe,
    no_cache: bool,
) -> BuildResult<BuildOutcome> {
    let reference = settings.image_reference();

    assemble_and_export(backend, recipe, &settings.source_dir, &reference, no_cache).await?;
    println!("Successfully built image: {}", reference.cyan());

    let published = if settings.should_publish() {
        println!("Pushing image to registry: {}", reference.cyan());
        let address = backend.publish(&reference, None).await?;
        println!("Successfully pushed image: {}", address.cyan());
        Some(address)
    } else {
        if settings.push {
            tracing::warn!("PUSH_TO_REGISTRY is set but REGISTRY is empty; skipping push");
        }
        None
    };

    Ok(BuildOutcome {
        reference,
        published,
    })
}

/// イメージをビルドしてローカルでサービスとして起動し、コンテナ ID を返す
pub async fn run(
    backend: &dyn ImageBackend,
    settings: &RunSettings,
    recipe: &ImageRecipe,
) -> BuildResult<String> {
    let reference = &settings.image_reference;
    let image =
        assemble_and_export(backend, recipe, &settings.source_dir, reference, false).await?;

    // 公開ポートはホスト側の同じ番号に割り当てる
    let service = ServiceSpec {
        name: settings.container_name.clone(),
        env: settings.container_env(),
        ports: image.exposed_ports.iter().map(|&port| (port, port)).collect(),
    };

    backend.serve(reference, &service).await
}

/// イメージをビルドし、指定の認証情報で `repository:tag` にプッシュ
///
/// 成功時は表示用のメッセージを返します。失敗はすべて
/// [`BuildError::PublishFailed`] でラップされます。
pub async fn publish(
    backend: &dyn ImageBackend,
    settings: &PublishSettings,
    recipe: &ImageRecipe,
) -> BuildResult<String> {
    let reference = settings.image_reference();
    let login = RegistryLogin {
        registry: extract_registry(&settings.repository),
        username: settings.username.clone(),
        password: settings.password.clone(),
    };
    tracing::debug!("Publishing {} to {}", reference, login.registry);

    let result: BuildResult<String> = async {
        assemble_and_export(backend, recipe, &settings.source_dir, &reference, false).await?;
        backend.publish(&reference, Some(&login)).await
    }
    .await;

    match result {
        Ok(address) => Ok(format!("Successfully built and pushed image: {}", address)),
        Err(e) => Err(BuildError::PublishFailed(Box::new(e))),
    }
}

use crate::docker;
use boltship_build::{ImageRecipe, pipeline};
use boltship_config::PublishSettings;
use colored::Colorize;

/// publish コマンドを処理
pub async fn handle(settings: &PublishSettings, verbose: bool) -> anyhow::Result<()> {
    println!("{}", "📤 イメージをビルドして公開中...".blue().bold());
    println!("イメージ: {}", settings.image_reference().cyan());

    println!();
    let backend = docker::init_backend_with_error_handling(verbose).await?;

    let recipe = ImageRecipe::node_app();
    let message = pipeline::publish(&backend, settings, &recipe).await?;

    println!();
    println!("{} {}", "✓".green(), message);

    Ok(())
}

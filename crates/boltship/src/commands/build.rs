use crate::docker;
use boltship_build::{ImageRecipe, pipeline};
use boltship_config::BuildSettings;
use colored::Colorize;

/// build コマンドを処理
pub async fn handle(settings: &BuildSettings, no_cache: bool, verbose: bool) -> anyhow::Result<()> {
    println!("{}", "Dockerイメージをビルド中...".green());
    println!("ソース: {}", settings.source_dir.display().to_string().cyan());
    println!("イメージ: {}", settings.image_reference().cyan());
    if settings.should_publish() {
        println!("プッシュ: {}", "有効".cyan());
    }

    println!();
    println!("{}", "Dockerに接続中...".blue());
    let backend = docker::init_backend_with_error_handling(verbose).await?;

    let recipe = ImageRecipe::node_app();
    let outcome = pipeline::build(&backend, settings, &recipe, no_cache).await?;

    println!();
    match outcome.published {
        Some(_) => println!(
            "{}",
            "✓ イメージがビルド＆プッシュされました！".green().bold()
        ),
        None => println!("{}", "✓ イメージがビルドされました！".green().bold()),
    }
    println!("  {}", outcome.reference.cyan());

    Ok(())
}

use crate::docker;
use boltship_build::{ImageRecipe, pipeline};
use boltship_config::{RunSettings, SERVICE_PORT};
use colored::Colorize;

/// run コマンドを処理
pub async fn handle(settings: &RunSettings, follow: bool, verbose: bool) -> anyhow::Result<()> {
    println!("{}", "Slack bot をローカルで起動中...".green());
    if settings.slack_bot_token.is_none() {
        println!("  {} SLACK_BOT_TOKEN が未設定です", "⚠".yellow());
    }
    if settings.slack_signing_secret.is_none() {
        println!("  {} SLACK_SIGNING_SECRET が未設定です", "⚠".yellow());
    }

    println!();
    println!("{}", "Dockerに接続中...".blue());
    let backend = docker::init_backend_with_error_handling(verbose).await?;

    let recipe = ImageRecipe::node_app();
    let container_id = pipeline::run(&backend, settings, &recipe).await?;

    println!();
    println!(
        "{} {} を起動しました ({})",
        "✓".green(),
        settings.container_name.cyan(),
        &container_id[..container_id.len().min(12)]
    );
    println!(
        "  → http://localhost:{}/v1/webhook",
        SERVICE_PORT.to_string().cyan()
    );

    if follow {
        println!();
        println!("{}", "Ctrl+C でログ追跡を終了".dimmed());
        let runner = backend.runner();
        tokio::select! {
            result = runner.follow_logs(&settings.container_name) => result?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "ログ追跡を終了しました（コンテナは起動したままです）".dimmed());
            }
        }
    }

    Ok(())
}

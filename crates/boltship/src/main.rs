mod commands;
mod docker;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "boltship")]
#[command(about = "Slack bot のコンテナイメージをビルド・起動・公開する", long_about = None)]
struct Cli {
    /// ビルドログをすべて表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをビルドしてエクスポート（CI向け、必要ならプッシュ）
    Build {
        /// アプリケーションのソースディレクトリ
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// イメージ名:タグ（デフォルト: slack-bolt-coder:latest）
        #[arg(long, env = "IMAGE_TAG")]
        image_tag: Option<String>,
        /// レジストリのプレフィックス（例: registry.example.com）
        #[arg(long, env = "REGISTRY")]
        registry: Option<String>,
        /// "true" の場合のみレジストリにプッシュ
        #[arg(
            long,
            env = "PUSH_TO_REGISTRY",
            num_args = 0..=1,
            default_missing_value = "true"
        )]
        push: Option<String>,
        /// キャッシュを使用しない
        #[arg(long)]
        no_cache: bool,
    },
    /// イメージをビルドしてローカルでサービスとして起動
    Run {
        /// アプリケーションのソースディレクトリ
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// Slack bot トークン
        #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
        slack_bot_token: Option<String>,
        /// Slack signing secret
        #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
        slack_signing_secret: Option<String>,
        /// 起動後にログを追跡
        #[arg(short, long)]
        follow: bool,
    },
    /// イメージをビルドしてレジストリに公開
    Publish {
        /// アプリケーションのソースディレクトリ
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// レジストリのユーザー名
        #[arg(long, env = "REGISTRY_USERNAME")]
        username: String,
        /// レジストリのパスワード / トークン
        #[arg(long, env = "REGISTRY_PASSWORD", hide_env_values = true)]
        password: String,
        /// リポジトリ（例: username/slack-notification）
        #[arg(long)]
        repository: String,
        /// イメージタグ（デフォルト: latest）
        #[arg(long)]
        tag: Option<String>,
    },
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ログはstderrに出力（stdoutは結果表示に使う）
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!();
        match e.downcast_ref::<boltship_build::BuildError>() {
            Some(build_error) => {
                eprintln!("{} {}", "✗".red().bold(), build_error.user_message())
            }
            None => eprintln!("{} {:#}", "✗".red().bold(), e),
        }
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let verbose = cli.verbose;

    match cli.command {
        Commands::Version => {
            println!("boltship {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Build {
            source,
            image_tag,
            registry,
            push,
            no_cache,
        } => {
            let settings = boltship_config::BuildSettings::new(
                image_tag.as_deref(),
                registry.as_deref(),
                push.as_deref(),
            )
            .with_source_dir(source);
            commands::build::handle(&settings, no_cache, verbose).await?;
        }
        Commands::Run {
            source,
            slack_bot_token,
            slack_signing_secret,
            follow,
        } => {
            let settings = boltship_config::RunSettings::new(slack_bot_token, slack_signing_secret)
                .with_source_dir(source);
            commands::run::handle(&settings, follow, verbose).await?;
        }
        Commands::Publish {
            source,
            username,
            password,
            repository,
            tag,
        } => {
            let settings = boltship_config::PublishSettings::new(
                &username,
                &password,
                &repository,
                tag.as_deref(),
            )?
            .with_source_dir(source);
            commands::publish::handle(&settings, verbose).await?;
        }
    }

    Ok(())
}

use boltship_build::DockerBackend;
use colored::Colorize;

fn print_connection_error(e: &dyn std::fmt::Display) {
    eprintln!();
    eprintln!("{}", "✗ Docker接続エラー".red().bold());
    eprintln!();
    eprintln!("{}", "原因:".yellow());
    eprintln!("  {}", e);
    eprintln!();
    eprintln!("{}", "解決方法:".yellow());
    eprintln!("  • Dockerが起動しているか確認してください");
    eprintln!("  • OrbStackまたはDocker Desktopがインストールされているか確認してください");
    eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
}

/// Docker接続を初期化（エラーハンドリング付き）
pub async fn init_backend_with_error_handling(verbose: bool) -> anyhow::Result<DockerBackend> {
    match DockerBackend::connect().await {
        Ok(backend) => Ok(backend.verbose(verbose)),
        Err(e) => {
            print_connection_error(&e);
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}

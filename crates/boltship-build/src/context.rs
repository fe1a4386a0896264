use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};
use tar::Builder;
use walkdir::WalkDir;

/// ビルドコンテキストから常に除外するパス
pub const DEFAULT_EXCLUDES: [&str; 7] = [
    "node_modules/",
    ".git/",
    "*.go",
    "go.mod",
    "go.sum",
    ".env",
    ".dagger/",
];

/// コンテキストに追加する生成済み Dockerfile の名前
pub const GENERATED_DOCKERFILE: &str = "Dockerfile.boltship";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct ExcludePattern {
    pattern: Pattern,
    /// 末尾が `/` のパターンはディレクトリにのみマッチ
    dir_only: bool,
}

/// 除外パターンの集合
///
/// パターンは .dockerignore と同じくコンテキストのルートから評価します。
/// 除外されたディレクトリ配下はすべて除外されます。
#[derive(Debug, Clone)]
pub struct ContextFilter {
    patterns: Vec<ExcludePattern>,
}

impl ContextFilter {
    pub fn new(patterns: &[&str]) -> BuildResult<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                let dir_only = raw.ends_with('/');
                let trimmed = raw.trim_end_matches('/').trim_start_matches("./");
                let pattern = Pattern::new(trimmed).map_err(|e| {
                    BuildError::InvalidRecipe(format!("invalid exclude pattern {}: {}", raw, e))
                })?;
                Ok(ExcludePattern { pattern, dir_only })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// コンテキストルートからの相対パスが除外対象か
    pub fn is_excluded(&self, relative: &Path, is_dir: bool) -> bool {
        let names: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        for depth in 0..names.len() {
            let entry_is_dir = depth + 1 < names.len() || is_dir;
            let prefix = names[..=depth].join("/");

            for exclude in &self.patterns {
                if exclude.dir_only && !entry_is_dir {
                    continue;
                }
                if exclude.pattern.matches_with(&prefix, MATCH_OPTIONS) {
                    return true;
                }
            }
        }

        false
    }
}

impl Default for ContextFilter {
    fn default() -> Self {
        Self::new(&DEFAULT_EXCLUDES).unwrap_or(Self {
            patterns: Vec::new(),
        })
    }
}

/// アーカイブ済みのビルドコンテキスト
#[derive(Debug, Clone)]
pub struct ContextArchive {
    /// tar.gz のバイト列
    pub data: Vec<u8>,
    /// 含まれるファイル（コンテキストルートからの相対パス）
    pub files: Vec<PathBuf>,
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// 除外パターンを適用してコンテキスト内のファイルを列挙
    pub fn collect_files(context_path: &Path, filter: &ContextFilter) -> BuildResult<Vec<PathBuf>> {
        Self::ensure_context_dir(context_path)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(context_path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let relative = entry.path().strip_prefix(context_path).unwrap_or(entry.path());
                !filter.is_excluded(relative, entry.file_type().is_dir())
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                BuildError::Io(std::io::Error::other(format!(
                    "failed to walk build context: {}",
                    e
                )))
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(context_path)
                .unwrap_or(entry.path())
                .to_path_buf();
            if relative == Path::new(GENERATED_DOCKERFILE) {
                continue;
            }
            files.push(relative);
        }

        Ok(files)
    }

    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `required` に挙げたファイルが除外後のコンテキストに無ければエラーにします。
    pub fn create_context(
        context_path: &Path,
        filter: &ContextFilter,
        dockerfile: &str,
        required: &[&str],
    ) -> BuildResult<ContextArchive> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let files = Self::collect_files(context_path, filter)?;

        for name in required {
            if !files.iter().any(|f| f == Path::new(name)) {
                return Err(BuildError::MissingSource(context_path.join(name)));
            }
        }

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            for relative in &files {
                tar.append_path_with_name(context_path.join(relative), relative)?;
            }

            // 生成した Dockerfile を追加
            let mut header = tar::Header::new_gnu();
            header.set_path(GENERATED_DOCKERFILE).map_err(|e| {
                BuildError::InvalidRecipe(format!("Failed to set Dockerfile path: {}", e))
            })?;
            header.set_size(dockerfile.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, dockerfile.as_bytes())?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!(
            "Build context created: {} files, {} bytes",
            files.len(),
            archive_data.len()
        );

        Self::check_context_size(archive_data.len());

        Ok(ContextArchive {
            data: archive_data,
            files,
        })
    }

    fn ensure_context_dir(context_path: &Path) -> BuildResult<()> {
        if !context_path.is_dir() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }
        Ok(())
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 除外されていない大きなファイルがないか確認してください。",
                size / 1024 / 1024
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn app_tree() -> tempfile::TempDir {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write(root, "package.json", "{}");
        write(root, "package-lock.json", "{}");
        write(root, "app.js", "console.log('hi')");
        write(root, "lib/util.js", "module.exports = {}");
        write(root, "README.md", "# bot");
        write(root, "build.go", "package main");
        write(root, "go.mod", "module slack");
        write(root, "go.sum", "");
        write(root, ".env", "SLACK_BOT_TOKEN=xoxb");
        write(root, ".git/HEAD", "ref: refs/heads/main");
        write(root, ".dagger/main.go", "package main");
        write(root, "node_modules/@slack/bolt/index.js", "");
        write(root, "config/.env", "LOCAL=1");
        write(root, "tools/gen.go", "package tools");
        temp_dir
    }

    #[test]
    fn test_filter_default_excludes() {
        let filter = ContextFilter::default();

        assert!(filter.is_excluded(Path::new(".git"), true));
        assert!(filter.is_excluded(Path::new(".git/HEAD"), false));
        assert!(filter.is_excluded(Path::new("node_modules/x/index.js"), false));
        assert!(filter.is_excluded(Path::new("build.go"), false));
        assert!(filter.is_excluded(Path::new("go.mod"), false));
        assert!(filter.is_excluded(Path::new("go.sum"), false));
        assert!(filter.is_excluded(Path::new(".env"), false));
        assert!(filter.is_excluded(Path::new(".dagger/main.go"), false));

        assert!(!filter.is_excluded(Path::new("app.js"), false));
        assert!(!filter.is_excluded(Path::new("package.json"), false));
        assert!(!filter.is_excluded(Path::new(".env.example"), false));
        assert!(!filter.is_excluded(Path::new("gopher.txt"), false));
    }

    #[test]
    fn test_filter_patterns_are_root_anchored() {
        let filter = ContextFilter::default();

        assert!(!filter.is_excluded(Path::new("tools/gen.go"), false));
        assert!(!filter.is_excluded(Path::new("sub/.env"), false));
        assert!(!filter.is_excluded(Path::new("pkg/go.mod"), false));
        assert!(!filter.is_excluded(Path::new("pkg/go.sum"), false));
        assert!(!filter.is_excluded(Path::new("web/node_modules/x.js"), false));
        assert!(!filter.is_excluded(Path::new("web/node_modules"), true));
    }

    #[test]
    fn test_filter_dir_only_pattern() {
        let filter = ContextFilter::new(&["cache/"]).unwrap();

        assert!(filter.is_excluded(Path::new("cache"), true));
        assert!(filter.is_excluded(Path::new("cache/a.bin"), false));
        // 同名のファイルはディレクトリパターンにマッチしない
        assert!(!filter.is_excluded(Path::new("cache"), false));
    }

    #[test]
    fn test_filter_nested_pattern() {
        let filter = ContextFilter::new(&["docs/*.md"]).unwrap();

        assert!(filter.is_excluded(Path::new("docs/intro.md"), false));
        assert!(!filter.is_excluded(Path::new("intro.md"), false));
        assert!(!filter.is_excluded(Path::new("src/docs/intro.md"), false));
    }

    #[test]
    fn test_collect_files() {
        let temp_dir = app_tree();
        let files = ContextBuilder::collect_files(temp_dir.path(), &ContextFilter::default()).unwrap();

        let expected: Vec<PathBuf> = [
            "README.md",
            "app.js",
            "config/.env",
            "lib/util.js",
            "package-lock.json",
            "package.json",
            "tools/gen.go",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(files, expected);
    }

    #[test]
    fn test_create_context() {
        let temp_dir = app_tree();

        let archive = ContextBuilder::create_context(
            temp_dir.path(),
            &ContextFilter::default(),
            "FROM alpine\n",
            &["package.json", "app.js"],
        )
        .unwrap();
        assert!(!archive.data.is_empty());

        // tarアーカイブとして展開できるか確認
        let extract_dir = tempdir().unwrap();
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive.data));
        let mut tar = tar::Archive::new(decoder);
        tar.unpack(extract_dir.path()).unwrap();

        let out = extract_dir.path();
        assert!(out.join(GENERATED_DOCKERFILE).exists());
        assert!(out.join("app.js").exists());
        assert!(out.join("lib/util.js").exists());
        assert!(!out.join(".env").exists());
        assert!(!out.join(".git").exists());
        assert!(!out.join("node_modules").exists());
        assert!(!out.join("build.go").exists());
        assert!(out.join("tools/gen.go").exists());
        assert_eq!(
            fs::read_to_string(out.join(GENERATED_DOCKERFILE)).unwrap(),
            "FROM alpine\n"
        );
    }

    #[test]
    fn test_create_context_missing_required_file() {
        let temp_dir = tempdir().unwrap();
        write(temp_dir.path(), "package.json", "{}");

        let result = ContextBuilder::create_context(
            temp_dir.path(),
            &ContextFilter::default(),
            "FROM alpine\n",
            &["package.json", "app.js"],
        );

        match result {
            Err(BuildError::MissingSource(path)) => assert!(path.ends_with("app.js")),
            other => panic!("Expected MissingSource, got {:?}", other.map(|a| a.files)),
        }
    }

    #[test]
    fn test_context_not_found() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope");

        let result = ContextBuilder::collect_files(&missing, &ContextFilter::default());
        assert!(matches!(result, Err(BuildError::ContextNotFound(_))));
    }
}

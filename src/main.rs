use avatar_codec::batch::BatchOptimizer;
use avatar_codec::cache::SelectionCache;
use avatar_codec::config::{self, PipelineConfig};
use avatar_codec::envelope::unwrap;
use avatar_codec::normalize::{NormalizeConfig, Normalizer, RasterNormalizer};
use avatar_codec::payload::ImagePayload;
use avatar_codec::select::CodecSelector;
use avatar_codec::{export, output};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that write a result.
#[derive(clap::Args, Clone)]
struct OutArgs {
    /// Write to FILE instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,
}

/// Shared flags for commands that use the selection cache.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Selection cache file
    #[arg(long, default_value = ".avatar-codec-cache.json")]
    cache: PathBuf,

    /// Disable the selection cache and re-run every codec
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "avatar-codec")]
#[command(about = "Tagged, reversible compression of profile-image data URLs")]
#[command(long_about = "\
Tagged, reversible compression of profile-image data URLs

Images are normalized to one size and format, then every enabled codec is
tried and the smallest output is stored behind a tag that says how to
reverse it:

  data:image/jpeg;base64,LZDICT:<dictionary-compressed base64>
  data:image/jpeg;base64,B85:<base85 of the image bytes>
  data:image/webp;base64,WEBP:<base64, already optimal>
  data:image/png;base64,<base64, stored as-is>

A compressed form is only kept if it saves at least min_savings (5%).
Decoding always reproduces the original bytes exactly.

Run 'avatar-codec gen-config' to generate a documented avatar-codec.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used if it does not exist)
    #[arg(long, default_value = "avatar-codec.toml", global = true)]
    config: PathBuf,

    /// Log codec decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize an image file and print its stored string
    Encode {
        file: PathBuf,
        #[command(flatten)]
        out: OutArgs,
    },
    /// Decode a stored string: image bytes with --out, else the plain data URL
    Decode {
        /// File holding the stored string, or '-' for stdin
        input: PathBuf,
        #[command(flatten)]
        out: OutArgs,
    },
    /// Show the header, tag, and sizes of a stored string
    Inspect {
        /// File holding the stored string, or '-' for stdin
        input: PathBuf,
    },
    /// Encode every image in a directory, keyed by file stem
    Batch {
        dir: PathBuf,
        /// JSON map of username to stored string
        #[arg(long, short, default_value = "avatars.json")]
        out: PathBuf,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Replace stored strings in an HTML file with plain data URLs
    Export {
        html: PathBuf,
        #[command(flatten)]
        out: OutArgs,
    },
    /// Print a stock avatar-codec.toml with all options documented
    GenConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    let selector = CodecSelector::from_config(&config.codecs);

    match cli.command {
        Command::Encode { file, out } => {
            let bytes = std::fs::read(&file)?;
            let payload = normalizer(&config).normalize(&bytes)?;
            let envelope = selector.select_best(&payload);
            write_output(out.out.as_deref(), &envelope.to_string())?;
        }
        Command::Decode { input, out } => {
            let stored = read_input(&input)?;
            let raw = selector.decode(&stored)?;
            match out.out {
                Some(path) => {
                    let payload = ImagePayload::from_data_url(&raw)?;
                    std::fs::write(&path, payload.bytes())?;
                }
                None => println!("{}", raw),
            }
        }
        Command::Inspect { input } => {
            let stored = read_input(&input)?;
            let envelope = unwrap(&stored);
            let decoded = selector.registry().decode_bytes(&envelope);
            output::print_inspect(&envelope, &decoded);
        }
        Command::Batch { dir, out, cache } => {
            let uploads = read_uploads(&dir)?;
            let mut selection_cache = if cache.no_cache {
                SelectionCache::empty()
            } else {
                SelectionCache::load(&cache.cache)
            };

            let optimizer = BatchOptimizer::new(selector).with_batch_size(config.batch.batch_size);
            let result = optimizer
                .optimize_uploads(&normalizer(&config), uploads, Some(&mut selection_cache))
                .await;

            let stored: BTreeMap<&str, String> = result
                .envelopes
                .iter()
                .map(|(user, envelope)| (user.as_str(), envelope.to_string()))
                .collect();
            std::fs::write(&out, serde_json::to_string_pretty(&stored)?)?;
            if !cache.no_cache {
                selection_cache.save(&cache.cache)?;
            }

            output::print_batch_report(&result.report, Some(selection_cache.stats()));
            println!("==> Wrote {}", out.display());
        }
        Command::Export { html, out } => {
            let content = std::fs::read_to_string(&html)?;
            let exported = export::decode_embedded_urls_with(selector.registry(), &content);
            write_output(out.out.as_deref(), &exported)?;
        }
        // Printed before the config is loaded
        Command::GenConfig => {}
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins; otherwise warnings, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "avatar_codec=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn normalizer(config: &PipelineConfig) -> RasterNormalizer {
    RasterNormalizer::new(NormalizeConfig::from_settings(&config.normalize))
}

/// Read a stored string from a file, or stdin for `-`.
fn read_input(path: &Path) -> std::io::Result<String> {
    let mut text = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut text)?;
    } else {
        text = std::fs::read_to_string(path)?;
    }
    Ok(text.trim().to_string())
}

fn write_output(path: Option<&Path>, text: &str) -> std::io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, text),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

/// Every regular file in `dir`, keyed by file stem.
///
/// Files are read in name order; when two files share a stem the first one
/// wins and the other is skipped with a warning.
fn read_uploads(dir: &Path) -> std::io::Result<BTreeMap<String, Vec<u8>>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut uploads = BTreeMap::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('.') {
            continue;
        }
        if uploads.contains_key(stem) {
            warn!(user = stem, skipped = %path.display(), "another upload has the same name");
            continue;
        }
        uploads.insert(stem.to_string(), std::fs::read(&path)?);
    }
    Ok(uploads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_uploads_keys_by_stem_and_skips_dotfiles() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("alice.png"), b"a").unwrap();
        std::fs::write(tmp.path().join("bob.jpg"), b"b").unwrap();
        std::fs::write(tmp.path().join(".DS_Store"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();

        let uploads = read_uploads(tmp.path()).unwrap();
        assert_eq!(uploads.keys().collect::<Vec<_>>(), vec!["alice", "bob"]);
        assert_eq!(uploads["alice"], b"a");
    }

    #[test]
    fn read_uploads_keeps_first_file_per_stem() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("alice.png"), b"png").unwrap();
        std::fs::write(tmp.path().join("alice.jpg"), b"jpg").unwrap();

        let uploads = read_uploads(tmp.path()).unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads["alice"], b"jpg");
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use artifact_fetch::config::{
    self, BinaryConfig, FetchConfig, Job, MANIFEST_FILE_NAME, Manifest, resolve_in_root,
};
use artifact_fetch::marker::DEFAULT_MARKER_FILE;
use artifact_fetch::{fetch, output};

/// Fetch versioned release artifacts from GitHub into the build tree.
///
/// Each artifact is described by a properties file holding `repo` and
/// `version`. A `.version` marker in the target directory makes repeated
/// runs free when nothing changed.
#[derive(Parser, Debug)]
#[command(
    name = "artifact-fetch",
    version,
    about,
    after_help = "Examples:\n  artifact-fetch fetch modules/sentry-native.properties --asset sentry-native.zip --target-dir modules/sentry-native --strip-prefix sentry-native/ --clean\n  artifact-fetch fetch-binary modules/wasm-split.properties --asset-stem wasm-split --target-dir modules/wasm-split\n  artifact-fetch sync\n  artifact-fetch status --manifest build/artifacts.toml"
)]
struct Cli {
    /// Project root. Relative paths resolve against it and --clean never leaves it.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Connect and inactivity timeout for downloads, e.g. "90s" or "5m"
    /// (overrides ARTIFACT_FETCH_TIMEOUT).
    #[arg(long, global = true)]
    timeout: Option<String>,

    /// Print every extracted entry.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a zip asset from a release and extract it into a directory.
    Fetch {
        /// Properties file with `repo` and `version`.
        descriptor: PathBuf,
        /// Asset file name attached to the release.
        #[arg(long)]
        asset: String,
        /// Directory to extract into.
        #[arg(long)]
        target_dir: PathBuf,
        /// Archive path prefix to strip from every entry.
        #[arg(long, default_value = "")]
        strip_prefix: String,
        /// Delete the target directory before extracting.
        #[arg(long)]
        clean: bool,
        /// Name of the version marker file inside the target directory.
        #[arg(long, default_value = DEFAULT_MARKER_FILE)]
        version_file: String,
        /// Expected SHA-256 of the asset.
        #[arg(long)]
        sha256: Option<String>,
    },

    /// Fetch a host-specific executable asset (`<stem>-<platform>`).
    FetchBinary {
        /// Properties file with `repo` and `version`.
        descriptor: PathBuf,
        /// Asset name without the platform suffix, e.g. "wasm-split".
        #[arg(long)]
        asset_stem: String,
        #[arg(long)]
        target_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_MARKER_FILE)]
        version_file: String,
    },

    /// Run every job in the manifest, stopping at the first failure.
    Sync {
        /// Manifest path (default: artifacts.toml under the project root).
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Show requested and installed versions without downloading.
    Status {
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Subcommand dispatch
// ---------------------------------------------------------------------------

fn project_root(root: &Path) -> Result<PathBuf> {
    if root.is_absolute() {
        return Ok(root.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(cwd.join(root))
}

fn load_manifest(root: &Path, manifest: Option<&Path>) -> Result<Manifest> {
    let path = match manifest {
        Some(p) => resolve_in_root(root, p),
        None => root.join(MANIFEST_FILE_NAME),
    };
    Manifest::load_from(&path)
}

fn run(cli: Cli) -> Result<()> {
    output::set_verbose(cli.verbose);
    let root = project_root(&cli.root)?;

    match cli.command {
        Command::Fetch {
            descriptor,
            asset,
            target_dir,
            strip_prefix,
            clean,
            version_file,
            sha256,
        } => {
            let mut cfg = FetchConfig::new(&root, &descriptor, asset, &target_dir);
            cfg.strip_prefix = strip_prefix;
            cfg.force_clean = clean;
            cfg.marker_file = version_file;
            cfg.sha256 = sha256;
            cfg.timeout = config::resolve_timeout(cli.timeout.as_deref(), None)?;
            fetch::fetch(&cfg).map(|_| ())
        }
        Command::FetchBinary {
            descriptor,
            asset_stem,
            target_dir,
            version_file,
        } => {
            let mut cfg = BinaryConfig::new(&root, &descriptor, asset_stem, &target_dir);
            cfg.marker_file = version_file;
            cfg.timeout = config::resolve_timeout(cli.timeout.as_deref(), None)?;
            let path = fetch::fetch_binary(&cfg)?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Sync { manifest } => {
            let manifest = load_manifest(&root, manifest.as_deref())?;
            let timeout =
                config::resolve_timeout(cli.timeout.as_deref(), manifest.timeout.as_deref())?;
            for job in manifest.jobs(&root, timeout) {
                fetch::run_job(&job).with_context(|| format!("Job '{}' failed", job.label()))?;
            }
            Ok(())
        }
        Command::Status { manifest } => {
            let manifest = load_manifest(&root, manifest.as_deref())?;
            let jobs = manifest.jobs(&root, artifact_fetch::download::DEFAULT_TIMEOUT);
            for job in &jobs {
                print_status(job)?;
            }
            Ok(())
        }
    }
}

fn print_status(job: &Job) -> Result<()> {
    let status = fetch::status(job)?;
    if status.up_to_date {
        output::success("Installed", &format!("{} v{}", status.label, status.requested));
    } else {
        let installed = status.installed.as_deref().unwrap_or("none");
        output::action(
            "Pending",
            &format!(
                "{} v{} (installed: {installed})",
                status.label, status.requested
            ),
        );
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        output::error(&format!("{e:#}"));
        process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

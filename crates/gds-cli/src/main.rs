//! gds: a POSIX-like shell over a cloud drive.
//!
//! Commands resolve against the active shell's virtual position; writes go
//! through the locally-synced mirror and a user-executed remote script. The
//! heavy lifting lives in gds-ops; this binary parses arguments, wires the
//! context, and renders typed results.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gds_cache::DownloadCache;
use gds_core::GdsConfig;
use gds_gateway::MemoryDrive;
use gds_mirror::MirrorLayout;
use gds_ops::{
    EditOptions, FindArgs, FindType, GdsContext, StdoutSink, UploadOptions,
};
use gds_remote::TtyPresenter;
use gds_shells::{ShellRecord, ShellRegistry};

#[derive(Parser, Debug)]
#[command(
    name = "gds",
    version,
    about = "Google Drive shell",
    long_about = "gds: run shell-like commands against a cloud drive through a synced mirror"
)]
struct Cli {
    /// Path to gds.toml configuration file
    #[arg(long, short = 'c', env = "GDS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage shell sessions
    Shell {
        #[command(subcommand)]
        action: ShellAction,
    },

    /// Print the current virtual path
    Pwd,

    /// List a directory (or a single file)
    Ls {
        path: Option<String>,
        /// Recursive listing with bounded depth and cycle protection
        #[arg(short = 'R', long)]
        recursive: bool,
        /// Structured entries instead of names
        #[arg(long)]
        detailed: bool,
    },

    /// Change the current directory
    Cd { path: String },

    /// Create a remote directory (always `-p`), verified by listing
    Mkdir {
        path: String,
        /// Accepted for familiarity; creation is always recursive
        #[arg(short = 'p', long)]
        parents: bool,
    },

    /// Remove a remote path (trusts the remote exit code)
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
        #[arg(short, long)]
        force: bool,
    },

    /// Move/rename remotely, verified by listing the destination
    Mv { source: String, destination: String },

    /// Create an empty remote file
    Touch { file: String },

    /// Print a file's content
    Cat { file: String },

    /// Numbered line view; optional `start end` or `[[s,e],...]` ranges
    Read {
        file: String,
        #[arg(trailing_var_arg = true)]
        ranges: Vec<String>,
    },

    /// Regex search across remote files
    Grep {
        pattern: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Echo text, optionally into a remote file: gds echo "hi" '>' a.txt
    Echo {
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },

    /// Upload files through the mirror
    Upload {
        #[arg(long)]
        force: bool,
        /// Remove local source files after successful verification
        #[arg(long)]
        remove_local: bool,
        /// Source files, optionally followed by a target directory
        #[arg(required = true)]
        args: Vec<String>,
    },

    /// Zip a folder, upload it, and extract at the target
    #[command(name = "upload-folder")]
    UploadFolder {
        #[arg(long)]
        keep_zip: bool,
        #[arg(long)]
        force: bool,
        folder: PathBuf,
        target: Option<String>,
    },

    /// Download a file (through the cache) to a local path
    Download {
        #[arg(long)]
        force: bool,
        file: String,
        local_path: Option<PathBuf>,
    },

    /// Apply a declarative replacement spec to a remote file
    Edit {
        /// Show the diff without uploading
        #[arg(long)]
        preview: bool,
        /// Upload a timestamped backup of the original alongside
        #[arg(long)]
        backup: bool,
        file: String,
        spec: String,
    },

    /// Remote find: gds find [path] -name '*.py' [-type f]
    Find {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Virtual environment management
    Venv {
        #[arg(long)]
        create: Option<String>,
        #[arg(long)]
        delete: Option<String>,
        #[arg(long)]
        activate: Option<String>,
        #[arg(long)]
        deactivate: bool,
        #[arg(long)]
        list: bool,
        #[arg(long)]
        current: bool,
    },

    /// Run python remotely: -c <code> or a Drive file with args
    Python {
        #[arg(short = 'c')]
        code: Option<String>,
        file: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run pip remotely
    Pip {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ShellAction {
    /// Create a shell (the first one becomes active)
    Create {
        #[arg(long)]
        name: Option<String>,
    },
    /// List shells; the active one is marked
    List,
    /// Switch the active shell (id or unique prefix)
    Checkout { id: String },
    /// Remove a shell
    Terminate { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration
    Show,
}

fn load_config(cli: &Cli) -> Result<GdsConfig> {
    match &cli.config {
        Some(path) => GdsConfig::load(path)
            .with_context(|| format!("loading config: {}", path.display())),
        None => {
            let default_path = dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gds")
                .join("gds.toml");
            if default_path.exists() {
                GdsConfig::load(&default_path)
                    .with_context(|| format!("loading config: {}", default_path.display()))
            } else {
                let mut config = GdsConfig::default();
                config.apply_env();
                Ok(config)
            }
        }
    }
}

struct App {
    config: GdsConfig,
    registry: ShellRegistry,
    cache: DownloadCache,
    gateway: MemoryDrive,
    presenter: TtyPresenter,
    progress: StdoutSink,
}

impl App {
    fn new(config: GdsConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let registry = ShellRegistry::open(&data_dir.join("shells.json"))?;
        let cache = DownloadCache::open(&data_dir.join("cache"))?;
        // In-process backend until provider credentials are wired; points at
        // the configured root folder id.
        let gateway = MemoryDrive::new(&config.remote.root_folder_id);
        Ok(App {
            config,
            registry,
            cache,
            gateway,
            presenter: TtyPresenter,
            progress: StdoutSink,
        })
    }

    fn active_shell(&self) -> Result<ShellRecord> {
        self.registry
            .active()
            .cloned()
            .context("No active remote shell, please create or switch to a shell")
    }
}

/// Build a context from disjoint field borrows, leaving `registry` and
/// `cache` free for `&mut` access alongside it.
macro_rules! ctx {
    ($app:expr) => {
        GdsContext {
            gateway: &$app.gateway,
            presenter: &$app.presenter,
            config: &$app.config,
            mirror: MirrorLayout::new(&$app.config.mirror.base_dir),
            progress: &$app.progress,
        }
    };
}

/// `upload a b c target`: the last argument is the target when it is not an
/// existing local file and more than one argument was given.
fn split_upload_args(args: &[String]) -> (Vec<PathBuf>, String) {
    if args.len() >= 2 {
        let last = &args[args.len() - 1];
        if !PathBuf::from(last).exists() {
            return (
                args[..args.len() - 1].iter().map(PathBuf::from).collect(),
                last.clone(),
            );
        }
    }
    (args.iter().map(PathBuf::from).collect(), ".".to_string())
}

/// `find [path] -name|-iname <pattern> [-type f|d]`.
fn parse_find_args(args: &[String]) -> Result<FindArgs> {
    let mut parsed = FindArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-name" | "-iname" => {
                let pattern = args
                    .get(i + 1)
                    .with_context(|| format!("{} needs a pattern", args[i]))?;
                parsed.iname = args[i] == "-iname";
                parsed.name = Some(pattern.clone());
                i += 2;
            }
            "-type" => {
                let t = args.get(i + 1).context("-type needs f or d")?;
                parsed.file_type = Some(match t.as_str() {
                    "f" => FindType::File,
                    "d" => FindType::Dir,
                    other => bail!("invalid -type {other}; use f or d"),
                });
                i += 2;
            }
            arg if !arg.starts_with('-') => {
                parsed.path = Some(arg.to_string());
                i += 1;
            }
            other => bail!("unknown find flag: {other}"),
        }
    }
    Ok(parsed)
}

fn print_listing(listing: &gds_path::Listing, detailed: bool) -> Result<()> {
    if detailed {
        println!("{}", serde_json::to_string_pretty(listing)?);
        return Ok(());
    }
    for folder in &listing.folders {
        println!("{}/", folder.name);
    }
    for file in &listing.files {
        println!("{}", file.name);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut app = App::new(config)?;

    match cli.command {
        Commands::Shell { action } => match action {
            ShellAction::Create { name } => {
                let root = app.config.remote.root_folder_id.clone();
                let record = app.registry.create(name.as_deref(), &root)?;
                println!("Shell created");
                println!("  id:   {}", record.id);
                println!("  name: {}", record.name);
            }
            ShellAction::List => {
                let active = app.registry.active_id().map(str::to_string);
                for shell in app.registry.list() {
                    let marker = if active.as_deref() == Some(shell.id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{marker} {}  {}  {}  last used {}",
                        shell.id, shell.name, shell.current_path, shell.last_accessed
                    );
                }
            }
            ShellAction::Checkout { id } => {
                let record = app.registry.checkout(&id)?;
                println!("Switched to shell {} ({})", record.name, record.id);
            }
            ShellAction::Terminate { id } => {
                app.registry.terminate(&id)?;
                println!("Shell terminated");
            }
        },

        Commands::Pwd => {
            let shell = app.active_shell()?;
            println!("{}", shell.current_path);
        }

        Commands::Ls {
            path,
            recursive,
            detailed,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let input = path.unwrap_or_else(|| ".".to_string());

            let resolved = ctx.resolver().resolve(&input, &pos).await?;
            match resolved {
                gds_path::Resolved::File {
                    file, parent_id, ..
                } => {
                    let listing = ctx.listing().single_file(&file, &parent_id, &input);
                    print_listing(&listing, detailed)?;
                }
                gds_path::Resolved::Folder {
                    folder_id,
                    display_path,
                } => {
                    if recursive && detailed {
                        let nested = ctx
                            .listing()
                            .list_recursive_detailed(&folder_id, &display_path)
                            .await?;
                        println!("{}", serde_json::to_string_pretty(&nested)?);
                    } else if recursive {
                        let flat = ctx
                            .listing()
                            .list_recursive(&folder_id, &display_path)
                            .await?;
                        for item in flat.folders.iter().chain(flat.files.iter()) {
                            println!("{}/{}", item.path, item.entry.name);
                        }
                    } else {
                        let listing =
                            ctx.listing().list(&folder_id, &display_path, detailed).await?;
                        print_listing(&listing, detailed)?;
                    }
                }
            }
        }

        Commands::Cd { path } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let (folder_id, display) = ctx.resolver().resolve_folder(&path, &pos).await?;
            // confirm it lists before committing the move
            ctx.listing().list(&folder_id, &display, false).await?;
            app.registry.update_position(&shell.id, &display, &folder_id)?;
            println!("Switched to directory: {display}");
        }

        Commands::Mkdir { path, parents: _ } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let display = gds_ops::mkdir(&ctx, &pos, &path).await?;
            println!("Created: {display}");
        }

        Commands::Rm {
            path,
            recursive,
            force,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            gds_ops::rm(&ctx, &mut app.cache, &pos, &path, recursive, force).await?;
        }

        Commands::Mv {
            source,
            destination,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            gds_ops::mv(&ctx, &pos, &source, &destination).await?;
        }

        Commands::Touch { file } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            gds_ops::touch(&ctx, &pos, &file).await?;
        }

        Commands::Cat { file } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            print!("{}", gds_ops::cat(&ctx, &pos, &file).await?);
        }

        Commands::Read { file, ranges } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let ranges = gds_ops::parse_read_ranges(&ranges)?;
            let output = gds_ops::read_file(&ctx, &mut app.cache, &pos, &file, &ranges).await?;
            println!("{output}");
        }

        Commands::Grep { pattern, files } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let results = gds_ops::grep(&ctx, &mut app.cache, &pos, &pattern, &files).await?;
            for (file, result) in &results {
                if let Some(error) = &result.error {
                    eprintln!("{file}: {error}");
                    continue;
                }
                for (line, cols) in &result.occurrences {
                    println!("{file}:{line}: columns {cols:?}");
                }
            }
        }

        Commands::Echo { args } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            // `echo <text> > <file>` — the redirection arrives as arguments
            if let Some(gt) = args.iter().position(|a| a == ">") {
                let text = args[..gt].join(" ");
                let target = args
                    .get(gt + 1)
                    .context("echo: missing redirection target")?;
                gds_ops::echo_to_file(&ctx, &pos, &text, target).await?;
            } else {
                println!("{}", args.join(" "));
            }
        }

        Commands::Upload {
            force,
            remove_local,
            args,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let (sources, target) = split_upload_args(&args);
            let opts = UploadOptions {
                force,
                remove_local,
                folder_upload: None,
            };
            let report =
                gds_ops::upload(&ctx, &mut app.cache, &pos, &sources, &target, &opts).await?;
            println!("{}", report.message);
            if !report.failed_files.is_empty() {
                println!("failed: {}", report.failed_files.join(", "));
            }
        }

        Commands::UploadFolder {
            keep_zip,
            force,
            folder,
            target,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let target = target.unwrap_or_else(|| ".".to_string());
            let report = gds_ops::upload_folder(
                &ctx,
                &mut app.cache,
                &pos,
                &folder,
                &target,
                keep_zip,
                force,
            )
            .await?;
            println!("{}", report.message);
        }

        Commands::Download {
            force,
            file,
            local_path,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let dest = local_path.unwrap_or_else(|| PathBuf::from("."));
            let spinner = indicatif::ProgressBar::new_spinner();
            spinner.set_message(format!("downloading {file}"));
            spinner.enable_steady_tick(std::time::Duration::from_millis(100));
            let outcome =
                gds_ops::download(&ctx, &mut app.cache, &pos, &file, Some(&dest), force).await?;
            spinner.finish_and_clear();
            let label = if outcome.from_cache { " (cached)" } else { "" };
            println!(
                "Downloaded {} bytes to {}{label}",
                outcome.bytes,
                outcome
                    .local_path
                    .as_deref()
                    .unwrap_or(&dest)
                    .display()
            );
        }

        Commands::Edit {
            preview,
            backup,
            file,
            spec,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let outcome = gds_ops::edit(
                &ctx,
                &mut app.cache,
                &pos,
                &file,
                &spec,
                EditOptions { preview, backup },
                None,
            )
            .await?;
            if outcome.preview {
                println!(
                    "preview: {} ({} -> {} lines, {} replacements)",
                    outcome.filename,
                    outcome.original_lines,
                    outcome.modified_lines,
                    outcome.replacements_applied
                );
            }
            print!("{}", outcome.diff);
            if let Some(backup) = &outcome.backup_filename {
                println!("Backup created: {backup}");
            }
            if let Some(lint) = &outcome.lint {
                if lint.has_issues {
                    println!("linter findings:\n{}", lint.formatted_output);
                }
            }
        }

        Commands::Find { args } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let parsed = parse_find_args(&args)?;
            for hit in gds_ops::find(&ctx, &pos, &parsed).await? {
                println!("{hit}");
            }
        }

        Commands::Venv {
            create,
            delete,
            activate,
            deactivate,
            list,
            current,
        } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);

            if let Some(name) = create {
                gds_ops::venv_create(&ctx, &pos, &name).await?;
                println!("Environment created: {name}");
            } else if let Some(name) = delete {
                gds_ops::venv_delete(&ctx, &pos, &name).await?;
                println!("Environment deleted: {name}");
            } else if let Some(name) = activate {
                gds_ops::venv_activate(&ctx, &mut app.registry, &pos, &shell.id, &name).await?;
                println!("Activated: {name}");
            } else if deactivate {
                gds_ops::venv_deactivate(&ctx, &mut app.registry, &pos, &shell.id).await?;
                println!("Deactivated");
            } else if list {
                for env in gds_ops::venv_list(&ctx).await? {
                    println!("{env}");
                }
            } else if current {
                match gds_ops::venv_current(&ctx, &shell.id).await? {
                    Some(env) => println!("Current virtual environment: {env}"),
                    None => println!("Current virtual environment: None"),
                }
            } else {
                bail!("venv: pass one of --create/--delete/--activate/--deactivate/--list/--current");
            }
        }

        Commands::Python { code, file, args } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            let result = match (code, file) {
                (Some(code), _) => gds_ops::python_code(&ctx, &pos, &code).await?,
                (None, Some(file)) => gds_ops::python_file(&ctx, &pos, &file, &args).await?,
                (None, None) => bail!("python: pass -c <code> or a file"),
            };
            print!("{}", result.stdout);
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
            if result.exit_code != 0 {
                bail!("python exited with {}", result.exit_code);
            }
        }

        Commands::Pip { args } => {
            let shell = app.active_shell()?;
            let pos = GdsContext::pos(&shell);
            let ctx = ctx!(app);
            if args.first().map(String::as_str) == Some("--show-deps") {
                let package = args.get(1).context("pip --show-deps <package>")?;
                for dep in gds_ops::pip_show_deps(&ctx, &pos, package).await? {
                    println!("{dep}");
                }
            } else {
                let result = gds_ops::pip(&ctx, &pos, &args).await?;
                print!("{}", result.stdout);
                if !result.stderr.is_empty() {
                    eprint!("{}", result.stderr);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml_pretty(&app.config)?);
            }
        },
    }

    Ok(())
}

fn toml_pretty(config: &GdsConfig) -> Result<String> {
    toml::to_string_pretty(config).context("rendering config")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        // short actionable line; details live in the debug log
        eprintln!("error: {e:#}");
        if let Some(gds) = e.downcast_ref::<gds_core::GdsError>() {
            if let Some(hint) = gds.suggestion() {
                eprintln!("hint: {hint}");
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

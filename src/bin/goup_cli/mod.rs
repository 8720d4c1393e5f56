pub mod check;
pub mod doctor;
pub mod list;
pub mod pick;
pub mod upgrade;

use async_trait::async_trait;
use directories::ProjectDirs;
use fxhash::FxHashMap;
use goup::catalog::{self, Endpoint, Release};
use goup::install::{DownloadInfo, InstallArgs};
use goup::platform::Platform;
use goup::{HttpClient, UrlMirror};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use smol_str::SmolStr;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

pub struct GoupSubcommand {
    cmd: clap::Command,
    run_command: Box<dyn RunSubcommand>,
}

// Cannot use `Fn` trait due to lifetime issues.
#[async_trait]
trait RunSubcommand: Send + Sync {
    async fn run(&self, ctx: &AppContext, args: &clap::ArgMatches) -> anyhow::Result<()>;
}

struct RunConfigPathSubcommand;

#[async_trait]
impl RunSubcommand for RunConfigPathSubcommand {
    async fn run(&self, ctx: &AppContext, _args: &clap::ArgMatches) -> anyhow::Result<()> {
        println!("{}", ctx.paths.config_file.display());
        Ok(())
    }
}

/// Everything a subcommand needs, built once from the configuration.
pub struct AppContext {
    pub paths: Paths,
    pub client: Arc<HttpClient>,
    pub dl_url: SmolStr,
}

pub struct LoadedConfig {
    pub mirror: UrlMirror,
    pub dl_url: SmolStr,
    pub user_agent: SmolStr,
    pub timeout: Duration,
    pub paths: Paths,
}

pub struct Paths {
    pub config_file: PathBuf,
    pub install_dir: PathBuf,
    pub download_dir: PathBuf,
}

pub struct GoupApp {
    cmd: clap::Command,
    run_commands: FxHashMap<SmolStr, Box<dyn RunSubcommand>>,
}

impl GoupApp {
    pub const CONFIG_PATH_CMD: &str = "config-path";

    pub fn new() -> Self {
        let mut run_commands: FxHashMap<SmolStr, Box<dyn RunSubcommand>> = FxHashMap::default();
        run_commands.insert(
            Self::CONFIG_PATH_CMD.into(),
            Box::new(RunConfigPathSubcommand),
        );
        Self {
            cmd: clap::Command::new("goup")
                .about("Keep the system Go installation up to date")
                .version(env!("CARGO_PKG_VERSION"))
                .subcommand_required(true)
                .arg_required_else_help(true)
                .arg(
                    clap::Arg::new("debug")
                        .long("debug")
                        .global(true)
                        .action(clap::ArgAction::SetTrue),
                )
                .subcommand(
                    clap::Command::new(Self::CONFIG_PATH_CMD)
                        .about("Get the path of the config file"),
                ),
            run_commands,
        }
    }

    pub fn add_subcommand(self, subcmd: GoupSubcommand) -> Self {
        let Self {
            mut cmd,
            mut run_commands,
        } = self;
        let name = subcmd.cmd.get_name().into();
        cmd = cmd.subcommand(subcmd.cmd);
        run_commands.insert(name, subcmd.run_command);
        Self { cmd, run_commands }
    }

    pub async fn run(self, ctx: AppContext) -> anyhow::Result<()> {
        let matches = self.cmd.get_matches();
        if !matches.get_flag("debug") {
            log::set_max_level(LevelFilter::Info);
        }

        let (subcmd, args) = matches.subcommand().expect("Subcommand is required");
        self.run_commands
            .get(subcmd)
            .expect("Subcommand should be present")
            .run(&ctx, args)
            .await
    }
}

impl Default for GoupApp {
    fn default() -> Self {
        Self::new()
    }
}

fn default_install_dir() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Go")
    } else {
        PathBuf::from("/usr/local/go")
    }
}

pub fn load_config() -> anyhow::Result<LoadedConfig> {
    let dirs =
        ProjectDirs::from("", "", "goup").ok_or_else(|| anyhow::anyhow!("No home directory"))?;

    let config_path = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => path.into(),
        None => dirs.config_dir().join("config.yaml"),
    };

    let config: goup::Config = match File::open(&config_path) {
        Ok(file) => serde_yaml_ng::from_reader(file)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Use default config when file is not found
            goup::Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(LoadedConfig {
        mirror: config.mirror.unwrap_or_default(),
        dl_url: config
            .dl_url
            .as_deref()
            .unwrap_or(goup::DEFAULT_DL_URL)
            .into(),
        user_agent: config
            .user_agent
            .as_deref()
            .unwrap_or(goup::DEFAULT_USER_AGENT)
            .into(),
        timeout: Duration::from_secs(config.timeout_secs.unwrap_or(goup::DEFAULT_TIMEOUT_SECS)),
        paths: Paths {
            config_file: config_path,
            install_dir: config.install_dir.unwrap_or_else(default_install_dir),
            download_dir: config.download_dir.unwrap_or_else(std::env::temp_dir),
        },
    })
}

pub fn add_platform_args(subcmd: clap::Command) -> clap::Command {
    subcmd
        .arg(
            clap::Arg::new("os")
                .long("os")
                .help("Target operating system as named by Go (e.g. linux, darwin, windows)"),
        )
        .arg(
            clap::Arg::new("arch")
                .long("arch")
                .help("Target architecture as named by Go (e.g. amd64, arm64)"),
        )
}

pub fn get_platform(args: &clap::ArgMatches) -> anyhow::Result<Platform> {
    Platform::resolve(
        args.get_one::<String>("os").map(|s| s.as_str()),
        args.get_one::<String>("arch").map(|s| s.as_str()),
    )
}

pub fn local_version_arg() -> clap::Arg {
    clap::Arg::new("local-version")
        .long("local-version")
        .value_name("version")
        .help("Treat this as the installed version instead of detecting it")
}

pub async fn get_local_version(
    ctx: &AppContext,
    args: &clap::ArgMatches,
) -> anyhow::Result<SmolStr> {
    if let Some(version) = args.get_one::<String>("local-version") {
        return Ok(version.as_str().into());
    }
    let install_dir = ctx.paths.install_dir.clone();
    goup::spawn_blocking(move || goup::local::detect(&install_dir)).await
}

pub fn all_arg() -> clap::Arg {
    clap::Arg::new("all")
        .long("all")
        .action(clap::ArgAction::SetTrue)
        .help("Include every release ever published, not only the current ones")
}

pub fn unstable_arg() -> clap::Arg {
    clap::Arg::new("unstable")
        .long("unstable")
        .action(clap::ArgAction::SetTrue)
        .help("Include beta and release candidate versions")
}

fn get_flag(args: &clap::ArgMatches, id: &str) -> bool {
    matches!(args.try_get_one::<bool>(id), Ok(Some(true)))
}

pub fn endpoint(ctx: &AppContext, args: &clap::ArgMatches) -> Endpoint {
    Endpoint {
        base_url: ctx.dl_url.clone(),
        include_all: get_flag(args, "all"),
    }
}

/// Fetches the catalog, dropping unstable releases unless `--unstable` is set.
pub async fn fetch_catalog(
    ctx: &AppContext,
    endpoint: &Endpoint,
    args: &clap::ArgMatches,
) -> anyhow::Result<Vec<Release>> {
    let mut releases = catalog::fetch(&ctx.client, endpoint).await?;
    if !get_flag(args, "unstable") {
        goup::resolver::retain_stable(&mut releases);
    }
    Ok(releases)
}

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";

/// Downloads and installs `info`, drawing a progress bar while downloading.
pub async fn install_with_progress(ctx: &AppContext, info: &DownloadInfo) -> anyhow::Result<()> {
    let mut download_state = InstallArgs {
        client: &ctx.client,
        info,
        install_dir: &ctx.paths.install_dir,
        download_dir: &ctx.paths.download_dir,
    }
    .install()
    .await?;

    let mut downloading_info_printed = false;
    let mut extracting_info_printed = false;
    let mut pb: Option<ProgressBar> = None;

    loop {
        match download_state.status() {
            goup::Status::InProgress {
                name,
                progress_ratio,
            } => {
                if name == "Downloading" {
                    if let Some((downloaded, total)) = progress_ratio {
                        if let Some(pb) = &pb {
                            pb.set_position(downloaded);
                        } else {
                            let new_pb = ProgressBar::new(total);
                            new_pb.set_style(
                                ProgressStyle::default_bar()
                                    .template(PROGRESS_TEMPLATE)?
                                    .progress_chars("#>-"),
                            );
                            new_pb.set_position(downloaded);
                            pb = Some(new_pb);
                        }
                    } else if !downloading_info_printed {
                        println!("Downloading {}...", info.filename);
                        downloading_info_printed = true;
                    }
                } else if name == "Extracting" {
                    if let Some(pb) = pb.take() {
                        pb.finish_with_message("Download complete");
                    }
                    if !extracting_info_printed {
                        println!("Extracting...");
                        extracting_info_printed = true;
                    }
                } else {
                    unreachable!("Unknown status: {:?}", name);
                }
            }
            goup::Status::Stopped => {
                break;
            }
        }

        download_state = download_state.advance().await?;
    }

    match goup::install::installed_version(&ctx.paths.install_dir).await {
        Ok(Some(version)) => println!(
            "Installed {version} into {}",
            ctx.paths.install_dir.display()
        ),
        Ok(None) => log::warn!(
            "Installed into {}, but its go binary could not be run",
            ctx.paths.install_dir.display()
        ),
        Err(e) => log::warn!("{e}"),
    }
    Ok(())
}

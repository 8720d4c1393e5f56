use async_trait::async_trait;
use goup::install::DownloadInfo;
use goup::resolver::{self, Resolution};

use super::{
    add_platform_args, endpoint, fetch_catalog, get_local_version, get_platform,
    install_with_progress, local_version_arg, unstable_arg, AppContext, GoupSubcommand,
};

pub const CMD: &str = "upgrade";

pub fn new_subcommand() -> GoupSubcommand {
    let cmd = clap::Command::new(CMD)
        .about("Install the newest Go release if it is newer than the installed one")
        .arg(local_version_arg())
        .arg(unstable_arg())
        .arg(
            clap::Arg::new("dry-run")
                .long("dry-run")
                .action(clap::ArgAction::SetTrue)
                .help("Print what would be downloaded without installing it"),
        );
    GoupSubcommand {
        cmd: add_platform_args(cmd),
        run_command: Box::new(RunUpgradeCommand),
    }
}

struct RunUpgradeCommand;

#[async_trait]
impl super::RunSubcommand for RunUpgradeCommand {
    async fn run(&self, ctx: &AppContext, args: &clap::ArgMatches) -> anyhow::Result<()> {
        let platform = get_platform(args)?;
        let local = get_local_version(ctx, args).await?;
        let endpoint = endpoint(ctx, args);
        let catalog = fetch_catalog(ctx, &endpoint, args).await?;

        let (release, artifact) = match resolver::resolve(&catalog, &local, &platform) {
            Resolution::UpToDate => {
                println!("You are using the latest version.");
                return Ok(());
            }
            Resolution::NoArtifactForPlatform { release } => {
                anyhow::bail!("{} has no archive for {}", release.version, platform);
            }
            Resolution::Upgrade { release, artifact } => (release, artifact),
        };

        let info = DownloadInfo::new(&endpoint, &release, &artifact);
        if args.get_flag("dry-run") {
            println!("{}", serde_yaml_ng::to_string(&info)?);
            return Ok(());
        }

        log::info!("Upgrading {} -> {}", local, release.version);
        install_with_progress(ctx, &info).await
    }
}

use async_trait::async_trait;
use goup::install::DownloadInfo;
use goup::resolver::{self, Resolution};
use goup::select::{self, SelectOne};
use goup::version::{compare, normalize};
use smol_str::SmolStr;
use std::cmp::Ordering;

use super::{
    add_platform_args, all_arg, endpoint, fetch_catalog, get_local_version,
    install_with_progress, local_version_arg, unstable_arg, AppContext, GoupSubcommand,
};

pub const CMD: &str = "pick";

pub fn new_subcommand() -> GoupSubcommand {
    let cmd = clap::Command::new(CMD)
        .about("Choose a Go release interactively and install it")
        .arg(all_arg())
        .arg(unstable_arg())
        .arg(local_version_arg())
        .arg(
            clap::Arg::new("force")
                .long("force")
                .action(clap::ArgAction::SetTrue)
                .help("Reinstall even if the chosen version is already installed"),
        );
    GoupSubcommand {
        cmd: add_platform_args(cmd),
        run_command: Box::new(RunPickCommand),
    }
}

struct RunPickCommand;

#[async_trait]
impl super::RunSubcommand for RunPickCommand {
    async fn run(&self, ctx: &AppContext, args: &clap::ArgMatches) -> anyhow::Result<()> {
        let platform = super::get_platform(args)?;
        let endpoint = endpoint(ctx, args);
        let catalog = fetch_catalog(ctx, &endpoint, args).await?;

        let options: Vec<SmolStr> = catalog.iter().map(|r| r.version.clone()).collect();
        let choice = goup::spawn_blocking(move || {
            select::stdio().select_one("Which Go version do you want to install?", &options)
        })
        .await?;
        let Some(index) = choice else {
            println!("Nothing selected.");
            return Ok(());
        };
        let release = &catalog[index];

        if !args.get_flag("force") {
            if let Ok(local) = get_local_version(ctx, args).await {
                if compare(&normalize(&local), &normalize(&release.version)) == Ordering::Equal {
                    println!("{} is already installed.", release.version);
                    return Ok(());
                }
            }
        }

        let artifact = match resolver::archive_for(release, &platform) {
            Resolution::Upgrade { artifact, .. } => artifact,
            _ => anyhow::bail!("{} has no archive for {}", release.version, platform),
        };

        println!("{}? Sounds good.", release.version);
        install_with_progress(ctx, &DownloadInfo::new(&endpoint, release, &artifact)).await
    }
}

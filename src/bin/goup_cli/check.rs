use async_trait::async_trait;
use goup::resolver;
use goup::version::normalize;

use super::{
    endpoint, fetch_catalog, get_local_version, local_version_arg, unstable_arg, AppContext,
    GoupSubcommand,
};

pub const CMD: &str = "check";

pub fn new_subcommand() -> GoupSubcommand {
    GoupSubcommand {
        cmd: clap::Command::new(CMD)
            .about("Check if a new version of Go is available")
            .arg(local_version_arg())
            .arg(unstable_arg())
            .arg(
                clap::Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .action(clap::ArgAction::SetTrue)
                    .help("List every newer release"),
            ),
        run_command: Box::new(RunCheckCommand),
    }
}

struct RunCheckCommand;

#[async_trait]
impl super::RunSubcommand for RunCheckCommand {
    async fn run(&self, ctx: &AppContext, args: &clap::ArgMatches) -> anyhow::Result<()> {
        let local = get_local_version(ctx, args).await?;
        let catalog = fetch_catalog(ctx, &endpoint(ctx, args), args).await?;

        let newer = resolver::newer_releases(&catalog, &local);
        let Some(latest) = newer.first() else {
            println!("You are using the latest version.");
            return Ok(());
        };

        println!(
            "New version available! Current: {}, Latest: {}",
            normalize(&local),
            normalize(&latest.version)
        );
        if args.get_flag("verbose") {
            for release in &newer {
                println!(
                    "  {}{}",
                    release.version,
                    if release.stable { "" } else { " [unstable]" }
                );
            }
        }
        Ok(())
    }
}

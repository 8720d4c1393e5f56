use async_trait::async_trait;
use goup::version::{compare, normalize};
use std::cmp::Ordering;

use super::{
    all_arg, endpoint, fetch_catalog, get_local_version, local_version_arg, unstable_arg,
    AppContext, GoupSubcommand,
};

pub const CMD: &str = "list";

pub fn new_subcommand() -> GoupSubcommand {
    GoupSubcommand {
        cmd: clap::Command::new(CMD)
            .about("List the releases published on the download index")
            .arg(all_arg())
            .arg(unstable_arg())
            .arg(local_version_arg()),
        run_command: Box::new(RunListCommand),
    }
}

struct RunListCommand;

#[async_trait]
impl super::RunSubcommand for RunListCommand {
    async fn run(&self, ctx: &AppContext, args: &clap::ArgMatches) -> anyhow::Result<()> {
        let local = match get_local_version(ctx, args).await {
            Ok(local) => Some(normalize(&local)),
            Err(e) => {
                log::debug!("{e}");
                None
            }
        };
        let catalog = fetch_catalog(ctx, &endpoint(ctx, args), args).await?;

        for release in &catalog {
            let installed = local.as_ref().is_some_and(|local| {
                compare(local, &normalize(&release.version)) == Ordering::Equal
            });
            println!(
                "{}{}{}",
                release.version,
                if release.stable { "" } else { " [unstable]" },
                if installed { " (installed)" } else { "" }
            );
        }
        Ok(())
    }
}

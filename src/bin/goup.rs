mod goup_cli;

use anyhow::Context;
use goup::HttpClient;
use goup_cli::{
    check, doctor, list, load_config, pick, upgrade, AppContext, GoupApp, LoadedConfig,
};
use log::LevelFilter;
use std::sync::Arc;

/// Exit status of a run interrupted with Ctrl-C, as shells report SIGINT.
const EXIT_CANCELLED: i32 = 130;

fn main() {
    stderrlog::new()
        .verbosity(LevelFilter::Trace)
        .init()
        .expect("Failed to initialize logger");

    let r = (|| -> anyhow::Result<()> {
        let LoadedConfig {
            mirror,
            dl_url,
            user_agent,
            timeout,
            paths,
        } = load_config()?;
        ctrlc::set_handler(move || {
            goup::set_cancelled();
        })
        .context("Error setting Ctrl-C handler")?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build the async runtime")?;

        let ctx = AppContext {
            paths,
            client: Arc::new(HttpClient::new(mirror, &user_agent, timeout)?),
            dl_url,
        };
        goup::cancelled_as_error(runtime.block_on(goup::CancellableFuture::new(
            GoupApp::new()
                .add_subcommand(check::new_subcommand())
                .add_subcommand(upgrade::new_subcommand())
                .add_subcommand(pick::new_subcommand())
                .add_subcommand(list::new_subcommand())
                .add_subcommand(doctor::new_subcommand())
                .run(ctx),
        )))
    })();

    if let Err(e) = r {
        if e.is::<goup::Cancelled>() {
            log::error!("Cancelled");
            std::process::exit(EXIT_CANCELLED);
        }
        log::error!("{e:?}");
        std::process::exit(1);
    }
}

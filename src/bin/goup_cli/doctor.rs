use async_trait::async_trait;
use goup::io::blocking;
use goup::platform::Platform;

use super::{AppContext, GoupSubcommand};

pub const CMD: &str = "doctor";

pub fn new_subcommand() -> GoupSubcommand {
    GoupSubcommand {
        cmd: clap::Command::new(CMD).about("Verify that this machine has what an upgrade needs"),
        run_command: Box::new(RunDoctorCommand),
    }
}

struct RunDoctorCommand;

fn report(ok: bool, message: String) -> bool {
    if ok {
        println!("✅ {message}");
    } else {
        println!("❌ {message}");
    }
    ok
}

#[async_trait]
impl super::RunSubcommand for RunDoctorCommand {
    async fn run(&self, ctx: &AppContext, _args: &clap::ArgMatches) -> anyhow::Result<()> {
        let install_dir = ctx.paths.install_dir.clone();
        let download_dir = ctx.paths.download_dir.clone();

        let checks = goup::spawn_blocking(move || {
            let mut results = Vec::new();

            results.push(match Platform::current() {
                Some(platform) => (true, format!("Platform: {platform}")),
                None => (false, "Go does not publish releases for this platform".to_owned()),
            });

            let install_root = install_dir.parent().unwrap_or(install_dir.as_path());
            results.push(if blocking::is_writable(install_root) {
                (true, format!("{} is writable", install_root.display()))
            } else {
                (
                    false,
                    format!(
                        "{} is not writable, run as an administrator or set install_dir",
                        install_root.display()
                    ),
                )
            });

            results.push(if blocking::is_writable(&download_dir) {
                (true, format!("{} is writable", download_dir.display()))
            } else {
                (false, format!("{} is not writable", download_dir.display()))
            });

            results.push(match blocking::find_in_path("go") {
                Some(go) => (true, format!("go found at {}", go.display())),
                None => (false, "\"go\" is not on PATH".to_owned()),
            });

            results.push(match goup::local::detect(&install_dir) {
                Ok(version) => (true, format!("Installed version: {version}")),
                Err(e) => (false, e.to_string()),
            });

            Ok(results)
        })
        .await?;

        let failed = checks
            .into_iter()
            .map(|(ok, message)| report(ok, message))
            .filter(|ok| !ok)
            .count();
        if failed > 0 {
            anyhow::bail!("{failed} check(s) failed");
        }
        println!("Dependencies check passed successfully.");
        Ok(())
    }
}

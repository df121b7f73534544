use std::{
    env,
    process::{Command, ExitStatus},
};

use anyhow::{bail, Context};

const HOST: &str = "pi@bike.local";
const REMOTE_DIR: &str = "~/bike";

/// Files copied next to the binary, relative to the workspace root
const CONFIGS: [&str; 2] = ["bike_config.toml", "cfg.json"];

pub fn main() -> anyhow::Result<()> {
    let Some(bin) = env::args().nth(1) else {
        bail!("No binary provided");
    };

    eprintln!("Stopping bike-exec");
    let status = ssh(&format!(
        "sudo pkill --signal SIGINT bike-exec && sleep 0.5 ; mkdir -p {REMOTE_DIR}"
    ))?;
    if !status.success() {
        bail!("Could not prepare {REMOTE_DIR}: {status}");
    }
    eprintln!();

    eprintln!("Uploading");
    let results = uploads(&bin)
        .into_iter()
        .map(|(local, remote)| {
            let status = Command::new("scp")
                .arg(&local)
                .arg(format!("{HOST}:{remote}"))
                .status()
                .with_context(|| format!("Spawn scp for {local}"))?;

            Ok((local, status))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if let Some((local, status)) = first_failure(&results) {
        bail!("Upload of {local} failed: {status}");
    }
    eprintln!("Upload success!");
    eprintln!();

    eprintln!("Running binary");
    let status = ssh(&format!("cd {REMOTE_DIR} && sudo ./bike-exec bike_config.toml"))?;
    if !status.success() {
        bail!("Remote run failed: {status}");
    }
    eprintln!("Remote run success!");

    Ok(())
}

fn ssh(command: &str) -> anyhow::Result<ExitStatus> {
    Command::new("ssh")
        .arg(HOST)
        .arg(command)
        .status()
        .context("Run ssh")
}

/// Local path and remote destination of everything the Pi needs
fn uploads(bin: &str) -> Vec<(String, String)> {
    let mut uploads = CONFIGS
        .iter()
        .map(|name| (format!("./bike/{name}"), format!("{REMOTE_DIR}/{name}")))
        .collect::<Vec<_>>();

    uploads.push((bin.to_owned(), format!("{REMOTE_DIR}/bike-exec")));
    uploads
}

fn first_failure(results: &[(String, ExitStatus)]) -> Option<&(String, ExitStatus)> {
    results.iter().find(|(_, status)| !status.success())
}

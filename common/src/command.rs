use std::{
    collections::HashMap,
    process::Stdio,
    time::{Duration, Instant},
};

use anyhow::Result;
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::process::Command;

use crate::exit;

lazy_static::lazy_static! {
    pub static ref DOTS_STYLE: ProgressStyle = ProgressStyle::with_template("{spinner} {msg} {elapsed_precise}").unwrap().tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pub static ref GREEN_TICK: StyledObject<&'static str> = style("✔").green();
    pub static ref RED_CROSS: StyledObject<&'static str> = style("✗").red();
}

pub fn progress(msg: &str) -> ProgressBar {
    let w = ProgressBar::new_spinner();
    w.set_style(DOTS_STYLE.clone());
    w.enable_steady_tick(Duration::from_millis(80));
    w.set_message(msg.to_owned());
    w
}

/// Runs an external command with a spinner and an [ongoing, failure, success]
/// message triple. The environment map is passed explicitly per invocation.
pub async fn run(
    cmd: &str,
    args: &[&str],
    verbose: bool,
    msgs: [&str; 3],
    env: &HashMap<String, String>,
) -> Result<()> {
    tracing::info!("{cmd} {args:?}");
    let mut command = Command::new(cmd);
    let mut _cmd = command.args(args).stderr(Stdio::piped());

    env.iter().for_each(|(k, v)| {
        _cmd.env(k, v);
    });

    let mut pb = None;
    if !verbose {
        _cmd = _cmd.stdout(Stdio::piped());
        pb = Some(progress(msgs[0]));
    }

    let start_time = Instant::now();
    let cmd_spawn = _cmd.spawn()?;
    let output = cmd_spawn.wait_with_output().await?;
    let dur = start_time.elapsed();
    if !output.status.success() {
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        exit!(stderr, "{} {}", RED_CROSS.to_string(), msgs[1]);
    }

    finish_progress(msgs[2], cmd, dur, pb);
    Ok(())
}

/// Quiet variant that returns trimmed stdout; used where the caller needs the
/// command's answer (device names, JSON dumps) rather than a progress line.
pub async fn run_captured(
    cmd: &str,
    args: &[&str],
    env: &HashMap<String, String>,
) -> Result<String> {
    tracing::debug!("{cmd} {args:?}");
    let output = Command::new(cmd)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        exit!(stderr, "{cmd} {} failed", args.first().unwrap_or(&""));
    }
    Ok(String::from_utf8(output.stdout)?.trim().to_owned())
}

pub fn finish_progress(
    status_message: &str,
    context: &str,
    dur: Duration,
    pb: Option<ProgressBar>,
) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!(
        "{} {} ({}) took {}.{:02}s",
        GREEN_TICK.to_string(),
        status_message,
        context,
        dur.as_secs(),
        (dur.as_millis() % 1000) / 10
    );
}

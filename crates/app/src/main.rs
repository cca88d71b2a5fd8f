//! `signalctl`: headless host for the intersection signal controller.
//!
//! ```text
//! signalctl [--config <file.json>] [--record <replay>] [--manual-clock]
//! signalctl --replay <replay>
//! ```
//!
//! The default mode speaks the JSON-lines protocol on stdin/stdout. Logs go
//! to stderr so they never mix with protocol output.

mod line_mode;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use bevy::log::LogPlugin;
use bevy::prelude::*;

use intersection::replay::{self, ReplayFile};
use intersection::signal_plugin::SignalClock;

use crate::settings::Settings;

const USAGE: &str = "usage: signalctl [--config <file>] [--record <path>] [--manual-clock] | --replay <path>";

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    record: Option<PathBuf>,
    replay: Option<PathBuf>,
    manual_clock: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            let mut path_for = |flag: &str| {
                args.next()
                    .map(PathBuf::from)
                    .ok_or_else(|| format!("{flag} needs a path"))
            };
            match arg.as_str() {
                "--config" => parsed.config = Some(path_for("--config")?),
                "--record" => parsed.record = Some(path_for("--record")?),
                "--replay" => parsed.replay = Some(path_for("--replay")?),
                "--manual-clock" => parsed.manual_clock = true,
                other => return Err(format!("unknown argument '{other}'")),
            }
        }
        if parsed.replay.is_some() && (parsed.record.is_some() || parsed.config.is_some()) {
            return Err("--replay takes its configuration from the replay file".to_string());
        }
        Ok(parsed)
    }
}

fn main() -> ExitCode {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("signalctl: {msg}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    // LogPlugin installs the global subscriber (stderr) when it is built.
    let mut app = App::new();
    app.add_plugins(LogPlugin::default());

    let result = match &args.replay {
        Some(path) => verify_replay(path),
        None => run_live(app, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("signalctl: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_live(app: App, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(args.config.as_deref(), |var| std::env::var(var).ok())?;
    let clock = if args.manual_clock {
        SignalClock::manual(0)
    } else {
        SignalClock::wall()
    };
    line_mode::run(app, &settings, clock, args.record.clone())
}

/// Replay a recorded session and print the report as one JSON line.
fn verify_replay(path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = ReplayFile::load(path)?;
    let report = replay::verify(&file)?;
    let summary = serde_json::json!({
        "type": "replay_verified",
        "digest": format!("{:08x}", report.digest),
        "ingests": report.ingests,
        "ticks": report.ticks,
        "resets": report.resets,
        "transitions": report.transitions,
        "presence_records": report.presence_records,
        "state": report.final_state,
    });
    println!("{summary}");
    Ok(())
}

//! JSON-lines driver: commands on stdin, responses and `traffic_state`
//! notices on stdout.
//!
//! A reader thread forwards stdin lines over a channel so the main loop can
//! keep the Bevy app updating (and the `FixedUpdate` tick running) while no
//! input arrives. With `--manual-clock` the controller's clock only moves
//! when a command carries an `at` field.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};

use bevy::prelude::*;

use intersection::protocol::{encode_line, make_response, ResponsePayload, SignalCommand};
use intersection::replay::{state_digest, ReplayRecorder};
use intersection::signal_plugin::{
    reset_intersection, tick_intersection, IngestResultLog, SensorInbox, SignalClock,
    SignalController, SignalStateChanged,
};
use intersection::{ConfigError, IntersectionSnapshot, Millis, ReplayError, SignalPlugin, SignalSet};

use crate::settings::Settings;

/// Snapshots announced since the last flush, in announcement order.
#[derive(Resource, Default)]
struct AnnouncedStates(Vec<IntersectionSnapshot>);

fn collect_announced_states(
    mut events: EventReader<SignalStateChanged>,
    mut announced: ResMut<AnnouncedStates>,
) {
    announced.0.extend(events.read().map(|e| e.0.clone()));
}

/// Output of one processed input line.
#[derive(Debug, Default)]
pub struct LineReply {
    pub lines: Vec<String>,
    pub quit: bool,
}

/// A running controller app plus the protocol state around it.
pub struct LineSession {
    app: App,
    record_to: Option<PathBuf>,
}

impl LineSession {
    /// Build the app around `app`, which may already carry host plugins
    /// (logging). Startup runs before this returns.
    pub fn new(
        mut app: App,
        settings: &Settings,
        clock: SignalClock,
        record_to: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let plugin = SignalPlugin::new(settings.config.clone())?
            .with_clock(clock)
            .with_tick_interval(settings.tick_interval);

        app.add_plugins(MinimalPlugins);
        if record_to.is_some() {
            app.insert_resource(ReplayRecorder::default());
        }
        app.add_plugins(plugin)
            .init_resource::<AnnouncedStates>()
            .add_systems(Update, collect_announced_states.after(SignalSet::Publish));
        app.update();

        // The startup reset is reported by `ready`, not as a notice.
        app.world_mut().resource_mut::<AnnouncedStates>().0.clear();
        Ok(Self { app, record_to })
    }

    pub fn ready(&self) -> String {
        encode_line(&make_response(ResponsePayload::Ready {
            state: self.controller().state(),
        }))
    }

    /// Handle one stdin line. Announced snapshots come first, then the
    /// response to the command itself.
    pub fn handle_line(&mut self, line: &str) -> LineReply {
        let line = line.trim();
        if line.is_empty() {
            return LineReply::default();
        }

        let payload = match serde_json::from_str::<SignalCommand>(line) {
            Ok(cmd) => self.process(cmd),
            Err(e) => ResponsePayload::Error {
                message: format!("parse error: {e}"),
            },
        };
        let quit = matches!(payload, ResponsePayload::Goodbye);

        let mut lines = self.drain_notices();
        lines.push(encode_line(&make_response(payload)));
        LineReply { lines, quit }
    }

    /// Let the app run one frame with no input: syncs the wall clock and
    /// runs any fixed ticks that came due.
    pub fn idle(&mut self) -> Vec<String> {
        self.app.update();
        self.drain_notices()
    }

    /// Stop recording (if enabled) and write the replay file.
    pub fn finish(&mut self) -> Result<Option<PathBuf>, ReplayError> {
        let Some(path) = self.record_to.take() else {
            return Ok(None);
        };
        let digest = state_digest(&self.controller().state());
        let world = self.app.world_mut();
        let Some(mut recorder) = world.get_resource_mut::<ReplayRecorder>() else {
            return Ok(None);
        };
        let file = recorder.stop(digest);
        file.save(&path)?;
        info!(
            "replay written to {} ({} entries, digest {:08x})",
            path.display(),
            file.entries.len(),
            digest
        );
        Ok(Some(path))
    }

    fn controller(&self) -> &intersection::Controller {
        &self.app.world().resource::<SignalController>().0
    }

    fn process(&mut self, cmd: SignalCommand) -> ResponsePayload {
        self.move_clock(cmd.at());

        match cmd {
            SignalCommand::Ingest { event, .. } => {
                let world = self.app.world_mut();
                world.resource_mut::<SensorInbox>().push(event);
                world.run_schedule(FixedUpdate);
                self.app.update();

                match self.app.world().resource::<IngestResultLog>().last() {
                    Some(record) => match &record.result {
                        Ok(outcome) => ResponsePayload::Ingested {
                            outcome: outcome.clone(),
                        },
                        Err(e) => ResponsePayload::Error {
                            message: e.to_string(),
                        },
                    },
                    None => ResponsePayload::Error {
                        message: "ingest produced no result".to_string(),
                    },
                }
            }

            SignalCommand::Tick { .. } => {
                let transitions = tick_intersection(self.app.world_mut());
                self.app.update();
                ResponsePayload::TickComplete { transitions }
            }

            SignalCommand::State => ResponsePayload::State {
                state: self.controller().state(),
            },

            SignalCommand::Lane { lane } => match self.controller().lane_state(&lane) {
                Some(lane) => ResponsePayload::Lane { lane },
                None => ResponsePayload::Error {
                    message: format!("unknown lane '{lane}'"),
                },
            },

            SignalCommand::Reset { .. } => {
                reset_intersection(self.app.world_mut());
                self.app.update();
                ResponsePayload::Ok
            }

            SignalCommand::Health => ResponsePayload::Health {
                health: self.controller().health(),
            },

            SignalCommand::Quit => ResponsePayload::Goodbye,
        }
    }

    fn move_clock(&mut self, at: Option<Millis>) {
        let mut clock = self.app.world_mut().resource_mut::<SignalClock>();
        match at {
            Some(at) if clock.is_manual() => clock.set(at),
            _ => clock.sync(),
        }
    }

    fn drain_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.app.world_mut().resource_mut::<AnnouncedStates>().0)
            .into_iter()
            .map(|state| encode_line(&make_response(ResponsePayload::TrafficState { state })))
            .collect()
    }

    #[cfg(test)]
    fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }
}

/// Run the blocking stdin/stdout loop until `quit` or end of input.
pub fn run(
    app: App,
    settings: &Settings,
    clock: SignalClock,
    record_to: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = LineSession::new(app, settings, clock, record_to)?;

    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read error: {e}");
                    break;
                }
            }
        }
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", session.ready())?;
    out.flush()?;
    info!(
        "signalctl ready: protocol v{}, tick every {} ms",
        intersection::protocol::PROTOCOL_VERSION,
        settings.tick_interval.as_millis()
    );

    loop {
        let (lines, quit) = match rx.recv_timeout(settings.tick_interval) {
            Ok(line) => {
                let reply = session.handle_line(&line);
                (reply.lines, reply.quit)
            }
            Err(RecvTimeoutError::Timeout) => (session.idle(), false),
            Err(RecvTimeoutError::Disconnected) => break,
        };
        for line in &lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        if quit {
            break;
        }
    }

    session.finish()?;
    info!("signalctl shutting down");
    Ok(())
}

//! Playback through a system audio player reading a temporary file

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;

use super::PlaybackStrategy;
use crate::voice::decode::{Container, decode_payload};
use crate::{Error, Result};

/// A command-line audio player
#[derive(Debug, Clone)]
pub struct PlayerCommand {
    pub program: &'static str,
    pub args: &'static [&'static str],
    pub containers: &'static [Container],
}

/// Players tried in order; the first one present on `PATH` is used
const DEFAULT_PLAYERS: &[PlayerCommand] = &[
    PlayerCommand {
        program: "pw-play",
        args: &[],
        containers: &[Container::Wav],
    },
    PlayerCommand {
        program: "paplay",
        args: &[],
        containers: &[Container::Wav],
    },
    PlayerCommand {
        program: "aplay",
        args: &["-q"],
        containers: &[Container::Wav],
    },
    PlayerCommand {
        program: "afplay",
        args: &[],
        containers: &[Container::Wav, Container::Mp3],
    },
    PlayerCommand {
        program: "ffplay",
        args: &["-nodisp", "-autoexit", "-loglevel", "quiet"],
        containers: &[Container::Wav, Container::Mp3],
    },
    PlayerCommand {
        program: "mpg123",
        args: &["-q"],
        containers: &[Container::Mp3],
    },
];

/// Writes the decoded bytes to a temporary file and hands it to a player
///
/// The file is removed when playback ends, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct SpooledPlayback {
    players: Vec<PlayerCommand>,
}

impl Default for SpooledPlayback {
    fn default() -> Self {
        Self {
            players: DEFAULT_PLAYERS.to_vec(),
        }
    }
}

impl SpooledPlayback {
    /// Use an explicit player list
    #[must_use]
    pub const fn with_players(players: Vec<PlayerCommand>) -> Self {
        Self { players }
    }

    fn find_player(&self, container: Container) -> Option<(PathBuf, &PlayerCommand)> {
        self.players
            .iter()
            .filter(|p| p.containers.contains(&container))
            .find_map(|p| which::which(p.program).ok().map(|path| (path, p)))
    }
}

#[async_trait]
impl PlaybackStrategy for SpooledPlayback {
    fn name(&self) -> &'static str {
        "spooled"
    }

    async fn play(&self, payload: &str) -> Result<()> {
        let bytes = decode_payload(payload)?;
        let container = Container::sniff(&bytes)
            .ok_or_else(|| Error::Playback("unrecognized audio container".to_string()))?;

        let (program, player) = self.find_player(container).ok_or_else(|| {
            Error::Playback(format!(
                "no system player for {} audio",
                container.extension()
            ))
        })?;

        let mut spool = tempfile::Builder::new()
            .prefix("voxwallet-")
            .suffix(&format!(".{}", container.extension()))
            .tempfile()?;
        spool.write_all(&bytes)?;
        spool.flush()?;

        tracing::debug!(
            player = player.program,
            path = %spool.path().display(),
            bytes = bytes.len(),
            "spooled playback"
        );

        let status = tokio::process::Command::new(&program)
            .args(player.args)
            .arg(spool.path())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;

        // Release the spool file before reporting
        drop(spool);

        let status = status?;
        if !status.success() {
            return Err(Error::Playback(format!(
                "{} exited with {status}",
                player.program
            )));
        }
        Ok(())
    }
}

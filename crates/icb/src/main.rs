use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use icb_core::{
    config::Config,
    messaging::{
        port::OutboundPort,
        throttled::{ThrottleConfig, ThrottledOutbound},
    },
    session::{ChatSession, SessionEnd},
    Error,
};

/// Chat-room command bot: custom commands, timed messages and moderators,
/// all stored in one config file.
#[derive(Debug, Parser)]
#[command(name = "icb", version)]
struct Cli {
    /// Path to the JSON config file.
    config_file_path: PathBuf,
}

/// Process exit statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exit {
    Ok = 0,
    Usage = 1,
    TransportFailure = 2,
    ConfigMissing = 3,
    ConfigIncomplete = 4,
}

impl From<Exit> for ExitCode {
    fn from(e: Exit) -> Self {
        ExitCode::from(e as u8)
    }
}

impl From<&SessionEnd> for Exit {
    fn from(end: &SessionEnd) -> Self {
        match end {
            SessionEnd::Shutdown => Exit::Ok,
            SessionEnd::TransportFailed { .. } => Exit::TransportFailure,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = icb_core::logging::init("icb") {
        eprintln!("{e}");
    }
    tracing::info!("Chat bot starting");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return Exit::Ok.into();
        }
        Err(e) => {
            tracing::error!("Usage : icb [config_file_path]");
            let _ = e.print();
            return Exit::Usage.into();
        }
    };

    let mut answers = BufReader::new(tokio::io::stdin());
    let exit = run(&cli.config_file_path, &mut answers, watch_for_shutdown).await;
    tracing::info!("Shutting down.");
    exit.into()
}

/// `answers` supplies replies to the write-defaults prompt. `watch_shutdown`
/// is handed the session's shutdown token once the bot is about to connect.
async fn run<R, W>(path: &Path, answers: &mut R, watch_shutdown: W) -> Exit
where
    R: AsyncBufRead + Unpin,
    W: FnOnce(CancellationToken),
{
    let cfg = match Config::load(path) {
        Ok(cfg) => cfg,
        Err(e @ Error::ConfigUnreadable { .. }) => {
            tracing::error!("Config file doesn't exist or path is malformed: {e}");
            offer_defaults(path, &Config::default(), answers).await;
            return Exit::ConfigMissing;
        }
        Err(e) => {
            tracing::warn!("{e}");
            Config::default()
        }
    };

    let missing = cfg.missing_mandatory();
    if !missing.is_empty() {
        tracing::error!(
            "Config file is empty, or mandatory options are missing: {}",
            missing.join(", ")
        );
        offer_defaults(path, &cfg, answers).await;
        return Exit::ConfigIncomplete;
    }

    tracing::info!(
        "Loaded {} commands, {} timed messages, {} moderators",
        cfg.commands.len(),
        cfg.timed_messages.len(),
        cfg.mod_users.len()
    );
    for command in cfg.commands.iter() {
        tracing::debug!("Command: {command}");
    }

    let (socket, events) = icb_socket::router::connect(cfg.socket_url());
    let outbound: Arc<dyn OutboundPort> =
        Arc::new(ThrottledOutbound::new(socket, ThrottleConfig::default()));

    let shutdown = CancellationToken::new();
    watch_shutdown(shutdown.clone());

    let mut session = ChatSession::new(cfg, outbound);
    let end = session.run(events, shutdown).await;
    let exit = Exit::from(&end);

    tracing::info!("Saving config...");
    if let Err(e) = session.into_config().save(path) {
        tracing::warn!("Could not save config file: {e}");
    }

    exit
}

/// Cancel `shutdown` once the operator presses Enter, stdin closes or Ctrl-C
/// arrives.
///
/// The blocking stdin read runs on a detached thread, never on the runtime's
/// blocking pool, so a pending read cannot hold the process open after a
/// transport failure.
fn watch_for_shutdown(shutdown: CancellationToken) {
    tracing::info!("Press Enter (or Ctrl-C) to save the config and exit");

    let on_enter = shutdown.clone();
    let spawned = std::thread::Builder::new()
        .name("icb-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if let Err(e) = std::io::stdin().read_line(&mut line) {
                tracing::warn!("stdin read failed: {e}");
            }
            on_enter.cancel();
        });
    if let Err(e) = spawned {
        tracing::warn!("Could not watch stdin, only Ctrl-C will stop the bot: {e}");
    }

    tokio::spawn(async move {
        tokio::select! {
          res = tokio::signal::ctrl_c() => match res {
            Ok(()) => shutdown.cancel(),
            Err(e) => tracing::warn!("Ctrl-C handler failed: {e}"),
          },
          _ = shutdown.cancelled() => {}
        }
    });
}

/// Ask the operator whether `cfg` should be written to `path`. Failures are
/// logged; the caller exits either way.
async fn offer_defaults<R>(path: &Path, cfg: &Config, answers: &mut R)
where
    R: AsyncBufRead + Unpin,
{
    match confirm("Would you like to write a new config file ? (y / N)", answers).await {
        Ok(true) => {
            tracing::info!("Writing config file to {}", path.display());
            if let Err(e) = cfg.save(path) {
                tracing::warn!("Could not write default config file: {e}");
            }
        }
        Ok(false) => {}
        Err(e) => tracing::warn!("{e:#}"),
    }
}

async fn confirm<R>(question: &str, answers: &mut R) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    tracing::info!("{question}");
    let mut line = String::new();
    answers
        .read_line(&mut line)
        .await
        .context("reading answer from stdin")?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    answer.to_lowercase().contains('y')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(Exit::Ok as u8, 0);
        assert_eq!(Exit::Usage as u8, 1);
        assert_eq!(Exit::TransportFailure as u8, 2);
        assert_eq!(Exit::ConfigMissing as u8, 3);
        assert_eq!(Exit::ConfigIncomplete as u8, 4);
    }

    #[test]
    fn session_end_maps_to_exit() {
        assert_eq!(Exit::from(&SessionEnd::Shutdown), Exit::Ok);
        assert_eq!(
            Exit::from(&SessionEnd::TransportFailed {
                cause: "x".to_string()
            }),
            Exit::TransportFailure
        );
    }

    #[test]
    fn cli_takes_exactly_one_path() {
        assert!(Cli::try_parse_from(["icb"]).is_err());
        assert!(Cli::try_parse_from(["icb", "a.json", "b.json"]).is_err());
        let cli = Cli::try_parse_from(["icb", "bot.json"]).unwrap();
        assert_eq!(cli.config_file_path, PathBuf::from("bot.json"));
    }

    #[test]
    fn only_answers_with_y_confirm() {
        assert!(is_yes("y\n"));
        assert!(is_yes("Yes"));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[tokio::test]
    async fn missing_config_exits_with_3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let mut answers: &[u8] = b"n\n";
        assert_eq!(run(&path, &mut answers, |_| {}).await, Exit::ConfigMissing);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_config_can_be_written_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let mut answers: &[u8] = b"y\n";
        assert_eq!(run(&path, &mut answers, |_| {}).await, Exit::ConfigMissing);
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[tokio::test]
    async fn incomplete_config_exits_with_4_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.json");
        let original = r#"{"id3chatbot":{"mountpoint":"defvs"}}"#;
        std::fs::write(&path, original).unwrap();

        let mut answers: &[u8] = b"";
        assert_eq!(run(&path, &mut answers, |_| {}).await, Exit::ConfigIncomplete);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    /// A complete config whose socket URL points at a port nothing listens on.
    fn unreachable_config() -> Config {
        let mut cfg = Config {
            mountpoint: "defvs".to_string(),
            auth_token: "tok".to_string(),
            mod_users: vec!["mod".to_string()],
            socket_url: Some("ws://127.0.0.1:9/chat".to_string()),
            ..Config::default()
        };
        cfg.commands
            .register(icb_core::commands::ChatCommand::new("!hi", "Hi %arg0%", 1));
        cfg
    }

    #[tokio::test]
    async fn transport_failure_exits_with_2_without_shutdown_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.json");
        std::fs::write(
            &path,
            r#"{"id3chatbot":{"mountpoint":"defvs","authToken":"tok","modUsers":["mod"],"commands":[{"keyword":"!hi","response":"Hi %arg0%","argCount":1}],"socketUrl":"ws://127.0.0.1:9/chat"}}"#,
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();

        // The shutdown token is never cancelled: the failure alone ends the run.
        let mut answers: &[u8] = b"";
        let exit = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            run(&path, &mut answers, |_| {}),
        )
        .await
        .expect("run must return on transport failure");
        assert_eq!(exit, Exit::TransportFailure);

        // Rewritten by the atomic writer, not left as the compact original.
        let expected = dir.path().join("expected.json");
        cfg.save(&expected).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::fs::read_to_string(&expected).unwrap()
        );
    }

    #[tokio::test]
    async fn save_failure_keeps_transport_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("conf");
        std::fs::create_dir(&conf_dir).unwrap();
        let path = conf_dir.join("bot.json");
        unreachable_config().save(&path).unwrap();

        // Pull the directory out from under the bot before it saves.
        let mut answers: &[u8] = b"";
        let gone = conf_dir.clone();
        let exit = run(&path, &mut answers, move |_| {
            std::fs::remove_dir_all(&gone).unwrap();
        })
        .await;

        assert_eq!(exit, Exit::TransportFailure);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn shutdown_request_exits_with_0_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.json");
        std::fs::write(
            &path,
            r#"{"id3chatbot":{"mountpoint":"defvs","authToken":"tok","socketUrl":"ws://127.0.0.1:9/chat"}}"#,
        )
        .unwrap();

        let mut answers: &[u8] = b"";
        let exit = run(&path, &mut answers, |token| token.cancel()).await;
        assert_eq!(exit, Exit::Ok);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.ends_with('\n'));
        assert_eq!(Config::load(&path).unwrap().mountpoint, "defvs");
    }

    #[tokio::test]
    async fn malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.json");
        std::fs::write(&path, "mountpoint = defvs").unwrap();

        let mut answers: &[u8] = b"yes\n";
        assert_eq!(run(&path, &mut answers, |_| {}).await, Exit::ConfigIncomplete);
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }
}

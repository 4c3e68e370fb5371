use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::io::{BufReader, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use decaptcha::cli::{Cli, Command};
use decaptcha::config::{ChainOptions, DecaptchaConfig};
use decaptcha::http::HttpClient;
use decaptcha::operator::Console;
use decaptcha::provider::{RelayChannel, RelayMessage};
use decaptcha::ui::DecodeProgress;
use decaptcha::{AttemptRecord, Decaptcha, DecodeError, ErrorKind, FeedbackHandle, Provider};

type StdinConsole = Console<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = DecaptchaConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let http = HttpClient::new()?;

    match cli.command {
        Command::Providers => {
            list_providers(&config, &http)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Decode {
            image,
            json,
            only,
            timeout,
            operator,
            confirm,
        } => {
            let args = DecodeArgs {
                image,
                json,
                only,
                timeout: timeout.map(Duration::from_secs),
                operator: operator || config.channel_friend.enabled,
                confirm,
            };
            decode(&config, &http, args).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct DecodeArgs {
    image: PathBuf,
    json: bool,
    only: Vec<String>,
    timeout: Option<Duration>,
    operator: bool,
    confirm: bool,
}

/// Machine-readable outcome printed with `--json`.
#[derive(Serialize)]
struct Report<'a> {
    solved: bool,
    provider: Option<&'a str>,
    text: Option<&'a str>,
    error_kind: Option<ErrorKind>,
    error: Option<String>,
    attempts: &'a [AttemptRecord],
}

async fn decode(config: &DecaptchaConfig, http: &HttpClient, args: DecodeArgs) -> Result<ExitCode> {
    let image = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("reading {}", args.image.display()))?;

    let (relay, inbox) = if args.operator {
        let (relay, inbox) = RelayChannel::new();
        (Some(relay), Some(inbox))
    } else {
        (None, None)
    };
    let options = ChainOptions {
        only: args.only,
        relay,
    };
    let chain = config.build_chain(http, &options)?;

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, args.timeout);

    let decaptcha = Decaptcha::with_cancellation(chain, cancel);
    let progress = DecodeProgress::start(&display_name(&args.image), decaptcha.providers().len());
    let mut console = Console::new(BufReader::new(tokio::io::stdin()));

    let outcome = match inbox {
        Some(mut inbox) => {
            let stop = CancellationToken::new();
            let decoding = async {
                let outcome = decaptcha.decode(image).await;
                stop.cancel();
                outcome
            };
            let (outcome, ()) = tokio::join!(
                decoding,
                console.serve(&mut inbox, &stop, |message| show_relay_message(&progress, message))
            );
            outcome
        }
        None => decaptcha.decode(image).await,
    };

    match outcome {
        Ok(result) => {
            if args.json {
                let report = Report {
                    solved: true,
                    provider: Some(&result.provider),
                    text: Some(&result.text),
                    error_kind: None,
                    error: None,
                    attempts: &result.attempts,
                };
                progress.suspend(|| print_json(&report))?;
            } else {
                result.attempts.iter().for_each(|record| progress.attempt(record));
            }
            progress.solved(&result.provider, &result.text);

            if args.confirm {
                confirm_answer(&mut console, result.feedback).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let attempts: &[AttemptRecord] = match &err {
                DecodeError::AllProvidersExhausted { attempts, .. } => attempts,
                DecodeError::NoProvidersConfigured => &[],
            };
            if args.json {
                let report = Report {
                    solved: false,
                    provider: None,
                    text: None,
                    error_kind: err.last_kind(),
                    error: Some(err.to_string()),
                    attempts,
                };
                progress.suspend(|| print_json(&report))?;
            } else {
                attempts.iter().for_each(|record| progress.attempt(record));
            }
            progress.failed(&err.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json(report: &Report<'_>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ctrl-C and the optional deadline both raise `cancel`.
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, canceling decode");
            on_signal.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(secs = timeout.as_secs(), "timeout reached, canceling decode");
            on_deadline.cancel();
        });
    }
}

/// Operator side of the channel_friend relay: saves each question's image to
/// a temp file and prompts for the answer.
fn show_relay_message(progress: &DecodeProgress, message: &RelayMessage) {
    match message {
        RelayMessage::Question(question) => {
            let path = std::env::temp_dir().join(format!("decaptcha-{}.jpeg", question.id));
            if let Err(e) = std::fs::write(&path, &question.image) {
                warn!(error = %e, "could not save question image");
            }
            progress.suspend(|| {
                eprintln!(
                    "Question {}: image saved to {}. Type the answer (empty to decline):",
                    question.id,
                    path.display()
                )
            });
        }
        RelayMessage::WrongAnswer { id } => {
            progress.suspend(|| eprintln!("Answer to question {id} was wrong."));
        }
        RelayMessage::Withdrawn { id } => {
            progress.suspend(|| eprintln!("Question {id} was withdrawn."));
        }
    }
}

async fn confirm_answer(console: &mut StdinConsole, feedback: Option<FeedbackHandle>) -> Result<()> {
    eprint!("Was the answer correct? [Y/n] ");
    if console.confirm().await? {
        return Ok(());
    }
    match feedback {
        Some(handle) => {
            info!(provider = handle.provider(), "reporting wrong answer");
            handle.send().await;
        }
        None => eprintln!("This provider does not accept wrong-answer reports."),
    }
    Ok(())
}

fn list_providers(config: &DecaptchaConfig, http: &HttpClient) -> Result<()> {
    // The relay only has to exist for channel_friend to be listed.
    let (relay, _inbox) = RelayChannel::new();
    let options = ChainOptions {
        only: Vec::new(),
        relay: config.channel_friend.enabled.then_some(relay),
    };
    let chain = config.build_chain(http, &options)?;
    if chain.is_empty() {
        println!("No providers configured. Add credentials to {}.", decaptcha::config::DEFAULT_PATH);
        return Ok(());
    }

    println!("{:<3} {:<15} {:>8} {:>8} {:>6} {:>10}", "#", "provider", "initial", "poll", "polls", "worst");
    for (i, provider) in chain.iter().enumerate() {
        let policy = provider.retry_policy();
        println!(
            "{:<3} {:<15} {:>7}s {:>7}s {:>6} {:>9}s",
            i + 1,
            provider.name(),
            policy.initial_delay.as_secs(),
            policy.poll_delay.as_secs(),
            policy.max_attempts,
            policy.worst_case_wait().as_secs()
        );
    }
    Ok(())
}

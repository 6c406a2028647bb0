//! `poolsync pair`: push-link handshake with a progress bar.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use poolsync_config::SecretStorage;
use poolsync_core::{ClientConfig, PairingConfig, PairingOutcome, PairingSession};

use crate::cli::{GlobalOpts, PairArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct PairResult {
    profile: String,
    address: String,
    identifier: String,
    degraded: bool,
    stored_in: &'static str,
}

fn progress_bar(window: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(window);
    let style = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}s")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub async fn handle(args: PairArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.wait == 0 {
        return Err(CliError::Validation {
            field: "wait".into(),
            reason: "the link window must be at least one second".into(),
        });
    }

    // An unreadable config must not be overwritten with defaults.
    let mut cfg = config::load_config()?;
    let profile = config::active_profile_name(global, &cfg);

    let mut client = ClientConfig::new(&args.address);
    if let Some(secs) = global.timeout {
        client.timeout = Duration::from_secs(secs);
    }
    let pairing = PairingConfig {
        timeout: Duration::from_secs(args.wait),
        ..PairingConfig::default()
    };
    let mut handle = PairingSession::new(client.build_client()?, pairing).begin();

    let bar = progress_bar(args.wait, global.quiet);
    bar.set_message("Press the button on the PoolSync hub");

    let cancel = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut terminal = None;
    while let Some(update) = handle.next_update().await {
        match update {
            PairingOutcome::Pending { time_remaining } => {
                let left = time_remaining.as_secs();
                bar.set_position(args.wait.saturating_sub(left));
                bar.set_message(format!("Press the button on the PoolSync hub ({left}s left)"));
            }
            done => {
                terminal = Some(done);
                break;
            }
        }
    }
    interrupt.abort();
    let outcome = match terminal {
        Some(outcome) => outcome,
        None => handle.outcome().await,
    };

    let pairing = match outcome {
        PairingOutcome::Succeeded(pairing) => pairing,
        PairingOutcome::Failed(failure) => {
            bar.abandon_with_message(failure.to_string());
            return Err(failure.into());
        }
        PairingOutcome::Pending { .. } => {
            bar.abandon();
            return Err(CliError::PairingFailed {
                reason: "session ended without a result".into(),
            });
        }
    };
    bar.finish_and_clear();

    if pairing.degraded && !global.quiet {
        eprintln!(
            "{} the hub did not report its hardware address; using {}",
            "warning:".if_supports_color(Stream::Stderr, |t| t.yellow()),
            pairing.credential.identifier()
        );
    }

    let storage =
        poolsync_config::store_credential(&mut cfg, &profile, &args.address, &pairing.credential);
    config::save_config(&cfg)?;

    let result = PairResult {
        profile,
        address: args.address,
        identifier: pairing.credential.identifier().to_owned(),
        degraded: pairing.degraded,
        stored_in: match storage {
            SecretStorage::Keyring => "keyring",
            SecretStorage::Plaintext => "config file",
        },
    };
    let out = output::render_single(&global.output, &result, |r| {
        format!(
            "{} Paired with {} ({}) as profile '{}'; secret stored in {}",
            "✓".if_supports_color(Stream::Stdout, |t| t.green()),
            r.address,
            r.identifier,
            r.profile,
            r.stored_in
        )
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

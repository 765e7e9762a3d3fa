//! Wires settings and collaborators into one control loop run

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::app::options::{MarkOptions, ServerOptions};
use crate::audit::JsonLinesAuditLog;
use crate::deploy::control::{
    CancelSignal, ControlLoopDeps, ControlLoopParams, DeploymentControlLoop,
};
use crate::deploy::docker::ensure_image_in_registry;
use crate::deploy::fleet::{DeployedShaLookup, FleetStatusClient};
use crate::deploy::fsm::ControlLoopState;
use crate::deploy::git::{GitAuthorLookup, GitRefTransport};
use crate::deploy::mutator::{DesiredStateMutator, MutatorOptions};
use crate::deploy::ExitStatus;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::slack::client::{ChatPoster, LogOnlyPoster, SlackClient};
use crate::slack::interactions::{ButtonAction, ButtonPressEvent};
use crate::slack::notifier::{NotifierDeps, UrlContext};
use crate::storage::deploy_info::load_deploy_info;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::utils::short_sha;

/// Result of a mark-for-deployment run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub exit: ExitStatus,
    pub state: ControlLoopState,
    pub reason: Option<String>,
    pub commit: String,
    pub old_commit: Option<String>,
}

/// Mark `options.commit` for deployment and follow it up.
///
/// Errors are returned only for problems found before anything was
/// mutated. Once the control loop starts, the outcome is in the summary.
pub async fn mark_for_deployment(
    options: &MarkOptions,
    settings: &Settings,
    layout: &StorageLayout,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<RunSummary, DeployError> {
    let soa_dir = options
        .soa_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.soa_dir));
    let deploy_info = load_deploy_info(&soa_dir, &options.service).await?;
    deploy_info.require_step(&options.deploy_group)?;

    // button presses only matter while a blocking auto-rollback run waits
    let listener_secret = if settings.interactions.enabled && options.block && options.auto_rollback {
        let secret = settings.interactions.signing_secret.as_ref().ok_or_else(|| {
            DeployError::ConfigError(
                "interactions.signing_secret is required when interactions are enabled".to_string(),
            )
        })?;
        Some(SecretString::from(secret.expose_secret().to_owned()))
    } else {
        None
    };

    let git_url = options
        .git_url
        .clone()
        .or_else(|| deploy_info.git_url.clone())
        .unwrap_or_else(|| settings.git.url_for(&options.service));

    if options.verify_image {
        let registry = HttpClient::new(&settings.registry.url)?;
        ensure_image_in_registry(&registry, &options.service, &options.commit).await?;
    }

    let fleet = Arc::new(FleetStatusClient::new(
        HttpClient::new(&settings.fleet.status_api_url)?,
        options.service.as_str(),
        Duration::from_secs(settings.fleet.poll_interval_secs),
    ));
    let old_commit = match fleet.currently_deployed_sha(&options.deploy_group).await {
        Ok(sha) => sha,
        Err(e) => {
            warn!("Could not determine the currently deployed sha: {}", e);
            None
        }
    };
    match &old_commit {
        Some(sha) => info!("{} currently runs {}", options.deploy_group, short_sha(sha)),
        None => info!("{} has no recorded deployment", options.deploy_group),
    }

    let checkout = settings.git.local_checkout.as_ref().map(PathBuf::from);
    let marker = Arc::new(DesiredStateMutator::new(
        Arc::new(GitRefTransport::new(
            checkout.clone().unwrap_or_else(|| PathBuf::from(".")),
        )),
        Arc::new(JsonLinesAuditLog::new(layout.audit_file())),
        MutatorOptions {
            attempts: settings.mutator.attempts(),
            cooldown: settings.mutator.cooldown(),
            ref_prefix: settings.git.ref_prefix.clone(),
        },
    ));

    let poster: Arc<dyn ChatPoster> = match &settings.slack.token {
        Some(token) => Arc::new(SlackClient::new(
            &settings.slack.api_base_url,
            SecretString::from(token.expose_secret().to_owned()),
        )?),
        None => {
            info!("No Slack token configured, notifications are only logged");
            Arc::new(LogOnlyPoster)
        }
    };

    let params = ControlLoopParams {
        service: options.service.clone(),
        deploy_group: options.deploy_group.clone(),
        commit: options.commit.clone(),
        old_commit: old_commit.clone(),
        git_url,
        block: options.block,
        auto_rollback: options.auto_rollback,
        timeout: options.timeout.unwrap_or_else(|| settings.default_timeout()),
    };
    let deps = ControlLoopDeps {
        marker,
        waiter: fleet.clone(),
        deployed: fleet,
        notifier: NotifierDeps {
            poster,
            authors: Arc::new(GitAuthorLookup::new(checkout)),
            url_context: UrlContext::from_env(),
            default_channels: settings.slack.default_channels.clone(),
        },
    };
    let mut control_loop = DeploymentControlLoop::new(params, deploy_info, deps);

    let (press_tx, press_rx) = mpsc::channel::<ButtonPressEvent>(16);
    let (server_stop_tx, server_stop_rx) = oneshot::channel::<()>();
    let listener = if let Some(signing_secret) = listener_secret {
        let server_options = ServerOptions {
            host: settings.interactions.host.clone(),
            port: settings.interactions.port,
        };
        let state = Arc::new(ServerState::new(press_tx, signing_secret));
        let (_, handle) = serve(&server_options, state, async move {
            let _ = server_stop_rx.await;
        })
        .await?;
        Some(handle)
    } else {
        drop(press_tx);
        None
    };

    let cancel_signal: CancelSignal = Box::pin(async move {
        tokio::select! {
            _ = shutdown_signal => {
                warn!("Shutdown signal received while waiting for the deployment");
            }
            _ = await_rollback_press(press_rx) => {}
        }
    });

    let exit = control_loop.run(cancel_signal).await;

    if let Some(handle) = listener {
        let _ = server_stop_tx.send(());
        match handle.await {
            Ok(Err(e)) => warn!("Interaction listener failed: {}", e),
            Err(e) => warn!("Interaction listener task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }

    Ok(RunSummary {
        exit,
        state: control_loop.state(),
        reason: control_loop.reason().map(str::to_string),
        commit: options.commit.clone(),
        old_commit,
    })
}

/// Resolve on the first rollback press; never resolve once all senders are gone
pub async fn await_rollback_press(mut presses: mpsc::Receiver<ButtonPressEvent>) {
    while let Some(press) = presses.recv().await {
        match press.action {
            ButtonAction::Rollback => {
                warn!("{} requested a rollback", press.username);
                return;
            }
            ButtonAction::Continue => {
                info!("{} acknowledged the deploy, still waiting", press.username);
            }
            ButtonAction::Other(value) => {
                warn!("Ignoring unknown button '{}' pressed by {}", value, press.username);
            }
        }
    }
    std::future::pending::<()>().await
}

use std::process::ExitCode;

use billing::BillingApi;
use dotenvy::dotenv;
use session::auth::domain::LoginInput;
use session::bootstrap::Portal;
use session::{observability, InitOutcome, SessionStatus};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn init_logging() {
    // .env first so RUST_LOG and LOG_FORMAT apply
    dotenv().ok();
    common::utils::logging::init_logging_from_env();
    info!(service = "portal", event = "logger_init", "tracing subscriber initialized");
}

fn credentials_from_env() -> Option<LoginInput> {
    let email = std::env::var("PORTAL_EMAIL").ok().filter(|v| !v.trim().is_empty())?;
    let password = std::env::var("PORTAL_PASSWORD").ok().filter(|v| !v.is_empty())?;
    Some(LoginInput { email, password })
}

/// Boot the session and report who is logged in. `Ok(false)` when the
/// backend could not be reached.
async fn run(cfg: configs::PortalConfig) -> anyhow::Result<bool> {
    let portal = Portal::bootstrap(&cfg).await?;
    let billing = BillingApi::from_portal(&portal);

    match portal.init().await {
        InitOutcome::Ready(Some(user)) => {
            info!(
                service = "portal",
                event = "session_restored",
                user = %user.display_name()
            );
        }
        InitOutcome::Ready(None) => {
            if let Some(input) = credentials_from_env() {
                match portal.auth.login(input).await {
                    Ok(session) => info!(
                        service = "portal",
                        event = "logged_in",
                        user = %session.user.display_name()
                    ),
                    Err(e) => warn!(
                        service = "portal",
                        event = "login_failed",
                        code = e.code(),
                        error = %e
                    ),
                }
            } else {
                info!(
                    service = "portal",
                    event = "anonymous",
                    "no stored session; set PORTAL_EMAIL and PORTAL_PASSWORD to log in"
                );
            }
        }
        InitOutcome::Unavailable(e) => {
            error!(
                service = "portal",
                event = "backend_unavailable",
                code = e.code(),
                error = %e
            );
            return Ok(false);
        }
    }

    if portal.context.status() == SessionStatus::Authenticated {
        match billing.businesses().list().await {
            Ok(businesses) => {
                for b in &businesses {
                    info!(
                        service = "portal",
                        event = "business",
                        name = %b.name,
                        gstin = ?b.gstin,
                        state = ?b.state()
                    );
                }
            }
            Err(e) => warn!(
                service = "portal",
                event = "business_list_failed",
                code = e.code(),
                error = %e
            ),
        }
    }

    debug!(metrics = %observability::encode_metrics(), "session metrics");
    Ok(portal.context.status() != SessionStatus::Unavailable)
}

fn main() -> ExitCode {
    init_logging();

    let run_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "portal",
            event = "panic",
            %run_id,
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    let cfg = match configs::PortalConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(
                service = "portal",
                event = "config_invalid",
                error = %e,
                "configuration rejected"
            );
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(
                service = "portal",
                event = "runtime_build_failed",
                error = %e,
                "failed to build tokio runtime"
            );
            return ExitCode::FAILURE;
        }
    };

    info!(
        service = "portal",
        event = "start",
        %run_id,
        pid,
        version,
        base_url = %cfg.api.base_url,
        "portal client starting"
    );

    rt.block_on(async move {
        tokio::select! {
            res = run(cfg) => match res {
                Ok(true) => {
                    info!(service = "portal", event = "stop", %run_id, "portal client finished");
                    ExitCode::SUCCESS
                }
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    error!(
                        service = "portal",
                        event = "run_failed",
                        error = %e,
                        "portal client failed"
                    );
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(
                    service = "portal",
                    event = "shutdown_signal",
                    %run_id,
                    "received Ctrl+C, exiting"
                );
                ExitCode::SUCCESS
            }
        }
    })
}

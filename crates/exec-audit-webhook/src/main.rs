use anyhow::Result;
use tracing::debug;

use exec_audit_webhook::{
    cli, config::Config, fatal_error, mark_tracing_initialized, tracing::setup_tracing,
    ExecAuditWebhook,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches).unwrap_or_else(|e| fatal_error(e.to_string()));

    // axum-server and kube pull in more than one rustls backend, the process
    // default has to be picked explicitly
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        fatal_error("Cannot install the rustls crypto provider".to_string());
    }

    match setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color) {
        Ok(()) => {
            debug!("tracing system ready");
            mark_tracing_initialized();
        }
        Err(err) => fatal_error(err.to_string()),
    }

    let webhook = ExecAuditWebhook::new_from_config(config)
        .await
        .unwrap_or_else(|e| fatal_error(e.to_string()));

    if let Err(e) = webhook.run().await {
        fatal_error(e.to_string());
    }

    Ok(())
}

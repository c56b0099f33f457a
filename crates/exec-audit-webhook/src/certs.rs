use std::{path::Path, sync::Arc};

use ::tracing::{info, warn};
use anyhow::{anyhow, Result};
use axum_server::tls_rustls::RustlsConfig;
use rustls::{
    server::{danger::ClientCertVerifier, WebPkiClientVerifier},
    RootCertStore, ServerConfig,
};
use rustls_pki_types::{pem::SliceIter, CertificateDer, PrivateKeyDer};

#[cfg(target_os = "linux")]
use tokio_stream::StreamExt;

use crate::config::TlsConfig;

/// Build the TLS configuration of the HTTPS server.
///
/// Certificate changes are not picked up on non-linux platforms, the
/// watching relies on inotify.
#[cfg(not(target_os = "linux"))]
pub(crate) async fn create_tls_config_and_watch_certificate_changes(
    tls_config: TlsConfig,
) -> Result<RustlsConfig> {
    let server_config = load_server_config(&tls_config).await?;
    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

/// Build the TLS configuration of the HTTPS server and keep it in sync with
/// the files on disk.
///
/// The server identity is reloaded once both the certificate and the key have
/// been rewritten. The client CA bundle is reloaded whenever one of its files
/// changes. A reload that fails keeps the previous configuration in place.
#[cfg(target_os = "linux")]
pub(crate) async fn create_tls_config_and_watch_certificate_changes(
    tls_config: TlsConfig,
) -> Result<RustlsConfig> {
    use ::tracing::error;
    use inotify::{Inotify, WatchDescriptor, WatchMask};

    let (mut certs, mut key) =
        load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await?;
    let mut client_verifier = load_client_verifier(&tls_config).await?;
    let initial_config =
        build_tls_server_config(certs.clone(), key.clone_key(), client_verifier.clone())?;

    let rustls_config = RustlsConfig::from_config(Arc::new(initial_config));
    let reloadable_rustls_config = rustls_config.clone();

    let inotify = Inotify::init().map_err(|e| anyhow!("Cannot initialize inotify: {e}"))?;
    let cert_watch = inotify
        .watches()
        .add(&tls_config.cert_file, WatchMask::CLOSE_WRITE)
        .map_err(|e| anyhow!("Cannot watch certificate file: {e}"))?;
    let key_watch = inotify
        .watches()
        .add(&tls_config.key_file, WatchMask::CLOSE_WRITE)
        .map_err(|e| anyhow!("Cannot watch key file: {e}"))?;
    let client_ca_watches = tls_config
        .client_ca_file
        .iter()
        .map(|path| {
            inotify
                .watches()
                .add(path, WatchMask::CLOSE_WRITE)
                .map_err(|e| anyhow!("Cannot watch client CA file: {e}"))
        })
        .collect::<Result<Vec<WatchDescriptor>>>()?;

    let stream = inotify
        .into_event_stream([0; 1024])
        .map_err(|e| anyhow!("Cannot create inotify event stream: {e}"))?;

    tokio::spawn(async move {
        tokio::pin!(stream);
        let mut cert_changed = false;
        let mut key_changed = false;

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("Cannot read inotify event: {e}");
                    continue;
                }
            };

            if event.wd == cert_watch {
                info!("TLS certificate file has been modified");
                cert_changed = true;
            }
            if event.wd == key_watch {
                info!("TLS key file has been modified");
                key_changed = true;
            }

            if client_ca_watches.contains(&event.wd) {
                info!("Reloading client CA certificates");
                match load_client_verifier(&tls_config).await {
                    Ok(verifier) => client_verifier = verifier,
                    Err(e) => {
                        error!("Failed to reload client CA certificates: {e}");
                        continue;
                    }
                }
            } else if !(cert_changed && key_changed) {
                // wait for the other half of the server identity
                continue;
            }

            if cert_changed && key_changed {
                info!("Reloading server TLS certificates");
                cert_changed = false;
                key_changed = false;

                match load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await
                {
                    Ok(identity) => (certs, key) = identity,
                    Err(e) => {
                        error!("Failed to reload TLS certificates: {e}");
                        continue;
                    }
                }
            }

            match build_tls_server_config(certs.clone(), key.clone_key(), client_verifier.clone())
            {
                Ok(server_config) => {
                    reloadable_rustls_config.reload_from_config(Arc::new(server_config));
                }
                Err(e) => error!("Failed to reload TLS configuration: {e}"),
            }
        }
    });

    Ok(rustls_config)
}

/// Load every TLS file referenced by the configuration and build a
/// `rustls::ServerConfig` out of them.
pub(crate) async fn load_server_config(tls_config: &TlsConfig) -> Result<ServerConfig> {
    let (certs, key) =
        load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await?;
    let client_verifier = load_client_verifier(tls_config).await?;

    build_tls_server_config(certs, key, client_verifier)
}

fn build_tls_server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    client_verifier: Option<Arc<dyn ClientCertVerifier>>,
) -> Result<ServerConfig> {
    let builder = match client_verifier {
        Some(client_verifier) => {
            ServerConfig::builder().with_client_cert_verifier(client_verifier)
        }
        None => ServerConfig::builder().with_no_client_auth(),
    };

    builder
        .with_single_cert(certs, key)
        .map_err(|e| anyhow!("Cannot build TLS server configuration: {e}"))
}

// The certificate file can hold a whole chain, the leaf comes first
async fn load_server_cert_and_key(
    cert_file: &Path,
    key_file: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let cert_contents = tokio::fs::read(cert_file)
        .await
        .map_err(|e| anyhow!("Cannot read certificate file {}: {e}", cert_file.display()))?;
    let key_contents = tokio::fs::read(key_file)
        .await
        .map_err(|e| anyhow!("Cannot read key file {}: {e}", key_file.display()))?;

    let certs = parse_certificates(&cert_contents, "server certificate");
    if certs.is_empty() {
        return Err(anyhow!(
            "No certificate found in certificate file {}",
            cert_file.display()
        ));
    }

    let key_iterator: SliceIter<PrivateKeyDer<'static>> = SliceIter::new(&key_contents[..]);
    let mut keys: Vec<PrivateKeyDer<'static>> = key_iterator
        .filter_map(|it| {
            if let Err(ref e) = it {
                warn!("Cannot parse private key: {e}");
            }
            it.ok()
        })
        .collect();
    if keys.len() != 1 {
        return Err(anyhow!(
            "Expected exactly one key in key file, found {}",
            keys.len()
        ));
    }

    Ok((certs, keys.remove(0)))
}

async fn load_client_verifier(
    tls_config: &TlsConfig,
) -> Result<Option<Arc<dyn ClientCertVerifier>>> {
    if tls_config.client_ca_file.is_empty() {
        return Ok(None);
    }

    let mut store = RootCertStore::empty();
    for client_ca_file in &tls_config.client_ca_file {
        let contents = tokio::fs::read(client_ca_file).await.map_err(|e| {
            anyhow!(
                "Cannot read client CA file {}: {e}",
                client_ca_file.display()
            )
        })?;
        let (added, ignored) =
            store.add_parsable_certificates(parse_certificates(&contents, "client CA certificate"));
        info!(
            client_ca_file = %client_ca_file.display(),
            client_ca_certs_added = added,
            client_ca_certs_ignored = ignored,
            "Loaded client CA certificates"
        );
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(store))
        .build()
        .map_err(|e| anyhow!("Cannot build client verifier: {e}"))?;
    Ok(Some(verifier))
}

fn parse_certificates(contents: &[u8], what: &str) -> Vec<CertificateDer<'static>> {
    let cert_iterator: SliceIter<CertificateDer<'static>> = SliceIter::new(contents);
    cert_iterator
        .filter_map(|it| {
            if let Err(ref e) = it {
                warn!("Cannot parse {what}: {e}");
            }
            it.ok()
        })
        .collect()
}

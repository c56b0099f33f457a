use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;

pub static SERVICE_NAME: &str = "exec-audit-webhook";

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

pub struct Config {
    pub addr: SocketAddr,
    pub tls_config: TlsConfig,
    pub store_timeout: Duration,
    pub ignore_kubernetes_connection_failure: bool,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub client_ca_file: Vec<PathBuf>,
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let addr = api_bind_address(matches)?;
        let tls_config = tls_config(matches)?;
        let store_timeout = store_timeout(matches)?;

        let ignore_kubernetes_connection_failure = matches
            .get_flag("ignore-kubernetes-connection-failure")
            .to_owned();

        let log_level = required_string(matches, "log-level")?;
        let log_fmt = required_string(matches, "log-fmt")?;
        let log_no_color = matches.get_flag("log-no-color");

        Ok(Self {
            addr,
            tls_config,
            store_timeout,
            ignore_kubernetes_connection_failure,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn required_string(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| anyhow!("error parsing arguments: missing value for {id}"))
}

fn api_bind_address(matches: &ArgMatches) -> Result<SocketAddr> {
    format!(
        "{}:{}",
        required_string(matches, "address")?,
        required_string(matches, "port")?
    )
    .parse()
    .map_err(|e| anyhow!("error parsing arguments: {}", e))
}

fn tls_config(matches: &ArgMatches) -> Result<TlsConfig> {
    let cert_file = required_string(matches, "cert-file")?;
    let key_file = required_string(matches, "key-file")?;
    if cert_file.is_empty() || key_file.is_empty() {
        return Err(anyhow!(
            "error parsing arguments: both --cert-file and --key-file must be provided"
        ));
    }

    let client_ca_file = matches
        .get_many::<String>("client-ca-file")
        .map(|files| {
            files
                .filter(|f| !f.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(TlsConfig {
        cert_file: PathBuf::from(cert_file),
        key_file: PathBuf::from(key_file),
        client_ca_file,
    })
}

fn store_timeout(matches: &ArgMatches) -> Result<Duration> {
    let seconds = required_string(matches, "store-timeout")?
        .parse::<u64>()
        .map_err(|e| anyhow!("error parsing arguments: invalid store timeout: {e}"))?;
    if seconds == 0 {
        return Err(anyhow!(
            "error parsing arguments: store timeout must be greater than zero"
        ));
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;

    fn config_from(args: &[&str]) -> Result<Config> {
        let matches = cli::build_cli()
            .try_get_matches_from(std::iter::once("exec-audit-webhook").chain(args.iter().copied()))
            .expect("arguments should be accepted by clap");
        Config::from_args(&matches)
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.addr, "0.0.0.0:8443".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.tls_config.cert_file,
            PathBuf::from("/etc/webhook/certs/tls.crt")
        );
        assert_eq!(
            config.tls_config.key_file,
            PathBuf::from("/etc/webhook/certs/tls.key")
        );
        assert!(config.tls_config.client_ca_file.is_empty());
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert!(!config.ignore_kubernetes_connection_failure);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_fmt, "text");
    }

    #[test]
    fn custom_values() {
        let config = config_from(&[
            "--addr",
            "127.0.0.1",
            "--port",
            "9443",
            "--cert-file",
            "/tmp/cert.pem",
            "--key-file",
            "/tmp/key.pem",
            "--client-ca-file",
            "/tmp/ca1.pem",
            "--client-ca-file",
            "/tmp/ca2.pem",
            "--store-timeout",
            "3",
            "--ignore-kubernetes-connection-failure",
            "--log-fmt",
            "json",
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9443".parse::<SocketAddr>().unwrap());
        assert_eq!(config.tls_config.cert_file, PathBuf::from("/tmp/cert.pem"));
        assert_eq!(
            config.tls_config.client_ca_file,
            vec![PathBuf::from("/tmp/ca1.pem"), PathBuf::from("/tmp/ca2.pem")]
        );
        assert_eq!(config.store_timeout, Duration::from_secs(3));
        assert!(config.ignore_kubernetes_connection_failure);
        assert_eq!(config.log_fmt, "json");
    }

    #[test]
    fn zero_store_timeout_is_rejected() {
        assert!(config_from(&["--store-timeout", "0"]).is_err());
    }

    #[test]
    fn invalid_store_timeout_is_rejected() {
        assert!(config_from(&["--store-timeout", "soon"]).is_err());
    }

    #[test]
    fn empty_cert_file_is_rejected() {
        assert!(config_from(&["--cert-file", ""]).is_err());
    }

    #[test]
    fn invalid_bind_address_is_rejected() {
        assert!(config_from(&["--addr", "not an address"]).is_err());
    }
}

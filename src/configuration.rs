use anyhow::{bail, Result};
use clap::{crate_description, crate_name, crate_version, App, Arg, ArgMatches};
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Deserialize, Default, Debug, Clone)]
struct Server {
    host: String,
    port: u16,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct Storage {
    // Retained under its historical name for continuity with the config
    // table in SPEC_FULL §6, even though it now addresses Postgres.
    mongo_url: String,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct Engine {
    poll_interval_ms: u64,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct Logging {
    log_level: String,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct PrometheusExporter {
    bind_address: String,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct Configuration {
    server: Server,
    storage: Storage,
    engine: Engine,
    logging: Logging,
    prometheus_exporter: PrometheusExporter,
}

impl Configuration {
    pub fn new(config_file: &str) -> Result<Self> {
        let cfg: Self = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("engine.poll_interval_ms", 1_000)?
            .set_default("logging.log_level", "info")?
            .set_default("prometheus_exporter.bind_address", "0.0.0.0:9898")?
            .add_source(config::File::with_name(config_file).required(false))
            .add_source(
                Environment::with_prefix("giftauction")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("PORT must be in 1..65535");
        }
        if self.engine.poll_interval_ms < 50 {
            bail!("ENGINE_POLL_INTERVAL_MS must be >= 50");
        }
        if self.storage.mongo_url.is_empty() {
            bail!("MONGO_URL (storage DSN) must be set");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn storage_url(&self) -> &str {
        &self.storage.mongo_url
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.engine.poll_interval_ms
    }

    pub fn log_level(&self) -> &str {
        &self.logging.log_level
    }

    pub fn prometheus_exporter_bind_address(&self) -> String {
        self.prometheus_exporter.bind_address.clone()
    }
}

pub fn get_matches() -> ArgMatches {
    App::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .arg(
            Arg::with_name("config-file")
                .short('c')
                .long("config-file")
                .takes_value(true)
                .default_value("./Config.toml")
                .help("The name of the configuration file"),
        )
        .get_matches()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_poll_interval_below_minimum() {
        let mut cfg = Configuration::default();
        cfg.engine.poll_interval_ms = 10;
        cfg.storage.mongo_url = "postgres://localhost/gift_auction".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_valid_defaults() {
        let mut cfg = Configuration::default();
        cfg.server.port = 8080;
        cfg.engine.poll_interval_ms = 1_000;
        cfg.storage.mongo_url = "postgres://localhost/gift_auction".into();
        assert!(cfg.validate().is_ok());
    }
}

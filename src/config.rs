use clap::Parser;

mod commandline;
mod defaults;
mod file;
mod primitives;

use commandline::{Args, Output};
use config::Config;
use defaults::Defaults;

pub(crate) use file::{Auth, ConfigFile as Configuration, Logging, ObjectStorage, Repo, Sled};
pub(crate) use primitives::LogFormat;

pub(crate) fn configure() -> color_eyre::Result<Configuration> {
    let Output {
        config_format,
        config_file,
        save_to,
    } = Args::parse().into_output();

    let config = Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(config::Environment::with_prefix("REEL").separator("__"))
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(config)
}

/// Build a configuration from the defaults and a set of overrides, skipping the commandline and
/// environment
pub(crate) fn configure_without_clap<T: serde::Serialize>(
    overrides: &T,
) -> color_eyre::Result<Configuration> {
    let built = Config::builder()
        .add_source(config::Config::try_from(&Defaults::default())?)
        .add_source(config::Config::try_from(overrides)?)
        .build()?;

    Ok(built.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    #[test]
    fn defaults_need_a_jwt_secret() {
        let res = super::configure_without_clap(&serde_json::json!({}));

        assert!(res.is_err());
    }

    #[test]
    fn overrides_merge_with_defaults() {
        let config = super::configure_without_clap(&serde_json::json!({
            "auth": { "jwt_secret": "shh" },
            "media": { "max_video_size": 5 },
        }))
        .expect("Valid configuration");

        assert_eq!(config.auth.jwt_secret, "shh");
        assert_eq!(config.auth.issuer, "reel-access");
        assert_eq!(config.media.max_video_size, 5);
        assert_eq!(config.media.max_thumbnail_size, 10);
        assert_eq!(config.server.address.port(), 8091);
        assert!(config.metrics.prometheus_address.is_none());
    }

    #[test]
    fn asset_url_defaults_to_server_port() {
        let config = super::configure_without_clap(&serde_json::json!({
            "auth": { "jwt_secret": "shh" },
            "server": { "address": "127.0.0.1:9000" },
        }))
        .expect("Valid configuration");

        let url = config.assets.public_url(config.server.address);

        assert_eq!(url.as_str(), "http://localhost:9000/assets/");
    }
}

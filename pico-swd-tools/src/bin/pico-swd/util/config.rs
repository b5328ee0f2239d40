use std::path::{Path, PathBuf};

use figment::providers::{Env, Format as _, Serialized, Toml};
use figment::Figment;
use pico_swd::flashing::FlashOptions;
use pico_swd::{LinkConfig, Target};
use serde::{Deserialize, Serialize};

use super::logging::Verbosity;

/// Unknown target '{name}', expected one of: {known}
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub struct UnknownTarget {
    name: String,
    known: String,
}

/// Everything the tool needs to know about the wiring and the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// GPIO character device the debug lines belong to.
    pub chip: PathBuf,
    pub target: String,
    pub swdio: u32,
    pub swclk: u32,
    pub reset: Option<u32>,
    /// Other lines wired to the target, floated during a hardware reset.
    pub extra_pins: Vec<u32>,
    pub half_period_us: u32,
    pub reset_hold_ms: u32,
    pub boot_settle_ms: u32,
    pub chunk_size: u32,
    pub verify: bool,
    pub log_level: Option<Verbosity>,
}

impl Default for Config {
    fn default() -> Self {
        let link = LinkConfig::new(24, 25);
        let flash = FlashOptions::default();
        Self {
            chip: PathBuf::from(pico_swd_linux::DEFAULT_CHIP),
            target: "rp2040".to_string(),
            swdio: link.swdio,
            swclk: link.swclk,
            reset: link.reset,
            extra_pins: link.extra_pins,
            half_period_us: link.half_period_us,
            reset_hold_ms: link.reset_hold_ms,
            boot_settle_ms: link.boot_settle_ms,
            chunk_size: flash.chunk_size,
            verify: flash.verify_staging,
            log_level: None,
        }
    }
}

/// Settings that can be overridden on the command line.
#[derive(Debug, Default, Clone, clap::Args, Serialize)]
pub struct ConfigOverrides {
    /// GPIO character device, e.g. /dev/gpiochip0
    #[clap(long, global = true, help_heading = "CONNECTION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    chip: Option<PathBuf>,

    /// Target profile: rp2040, rp2350 or rp2350-riscv
    #[clap(long, global = true, help_heading = "CONNECTION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,

    #[clap(long, global = true, help_heading = "CONNECTION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    swdio: Option<u32>,

    #[clap(long, global = true, help_heading = "CONNECTION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    swclk: Option<u32>,

    /// GPIO wired to the target's RUN pin
    #[clap(long, global = true, help_heading = "CONNECTION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    reset: Option<u32>,
}

impl Config {
    /// Merge the defaults, `path` if it exists, `PICO_SWD_*` variables and
    /// the command line, in that order.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        Self::figment(path, overrides).extract().map_err(anyhow::Error::from)
    }

    fn figment(path: &Path, overrides: &ConfigOverrides) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PICO_SWD_").ignore(&["config"]))
            .merge(Serialized::defaults(overrides))
    }

    pub fn target(&self) -> Result<Target, UnknownTarget> {
        Target::by_name(&self.target).ok_or_else(|| UnknownTarget {
            name: self.target.clone(),
            known: Target::all()
                .iter()
                .map(|target| target.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    pub fn link_config(&self) -> LinkConfig {
        let mut link = LinkConfig::new(self.swdio, self.swclk)
            .with_half_period_us(self.half_period_us)
            .with_reset_timing(self.reset_hold_ms, self.boot_settle_ms);
        if let Some(reset) = self.reset {
            link = link.with_reset(reset);
        }
        for pin in &self.extra_pins {
            link = link.with_extra_pin(*pin);
        }
        link
    }

    pub fn flash_options(&self) -> FlashOptions {
        FlashOptions::default()
            .with_chunk_size(self.chunk_size)
            .with_verify_staging(self.verify)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn from_toml(toml: &str, overrides: &ConfigOverrides) -> Config {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .merge(Serialized::defaults(overrides))
            .extract()
            .unwrap()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::figment(Path::new("does-not-exist.toml"), &ConfigOverrides::default())
            .extract::<Config>()
            .unwrap();

        assert_eq!(config.swdio, 24);
        assert_eq!(config.swclk, 25);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.target().unwrap(), Target::rp2040());
    }

    #[test]
    fn file_values_are_used() {
        let config = from_toml(
            r#"
            target = "rp2350"
            swdio = 2
            swclk = 3
            reset = 4
            extra_pins = [14, 15]
            log_level = "DEBUG"
            "#,
            &ConfigOverrides::default(),
        );

        assert_eq!(config.target().unwrap(), Target::rp2350());
        assert_eq!(config.reset, Some(4));
        assert_eq!(config.log_level, Some(Verbosity::Debug));

        let link = config.link_config();
        assert_eq!(link.swdio, 2);
        assert_eq!(link.extra_pins, vec![14, 15]);
    }

    #[test]
    fn command_line_wins() {
        let overrides = ConfigOverrides {
            swdio: Some(7),
            target: Some("rp2350-riscv".to_string()),
            ..Default::default()
        };

        let config = from_toml("swdio = 2\nswclk = 3", &overrides);

        assert_eq!(config.swdio, 7);
        assert_eq!(config.swclk, 3);
        assert_eq!(config.target, "rp2350-riscv");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("swd_io = 2"))
            .extract::<Config>();

        assert!(result.is_err());
    }

    #[test]
    fn unknown_target_lists_known_ones() {
        let config = Config {
            target: "rp2030".to_string(),
            ..Default::default()
        };

        let error = config.target().unwrap_err();

        assert_eq!(
            error.to_string(),
            "Unknown target 'rp2030', expected one of: rp2040, rp2350, rp2350-riscv"
        );
    }
}

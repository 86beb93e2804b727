#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod config;

pub use self::config::{
    Config, Filter, FilterChain, JwksFetcher, Listener, LogoutConfig, Match, MockConfig,
    OidcConfig, TokenConfig,
};

pub const CONTROLLER_NAME: &str = "authservice-chain-controller";

/// The ConfigMap key under which the authservice configuration is stored.
pub const CONFIG_KEY: &str = "config.json";

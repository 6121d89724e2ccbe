#![allow(dead_code)]

use mahjong::config::DeploymentConfig;
use mahjong::Deployment;
use tracing::Level;

pub const ADMIN: &str = "0xadmin";
pub const AIRDROP: &str = "0xairdrop";
pub const ALICE: &str = "0xa11ce";
pub const BOB: &str = "0xb0b";

pub fn init_test_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub fn config_toml(rule: Option<&str>) -> String {
    let rule = rule.map(|r| format!("rule = \"{r}\"")).unwrap_or_default();
    format!(
        r#"
        [token]
        uri = "https://mahjong.example/{{id}}.json"
        admin = "{ADMIN}"

        [airdrop]
        address = "{AIRDROP}"
        {rule}
        "#
    )
}

fn genesis(toml: &str) -> Deployment {
    init_test_tracing();
    let config = DeploymentConfig::from_toml(toml).unwrap();
    Deployment::genesis(&config).unwrap()
}

/// Deployment with the airdrop's default eligibility rule.
pub fn default_deployment() -> Deployment {
    genesis(&config_toml(None))
}

pub fn deployment(rule: &str) -> Deployment {
    genesis(&config_toml(Some(rule)))
}

use std::sync::Arc;

use pibot_core::config::Config;
use pibot_system::{HostPower, HostProbe};

#[tokio::main]
async fn main() -> Result<(), pibot_core::Error> {
    let cfg = Arc::new(Config::load()?);
    pibot_core::logging::init(cfg.verbose);

    let system = Arc::new(HostProbe::new());
    let power = Arc::new(HostPower::new());

    pibot_telegram::router::run_polling(cfg, system, power)
        .await
        .map_err(|e| pibot_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}

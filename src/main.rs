use std::sync::Arc;

use soundbot::{
    bot::Soundbot,
    common::{
        AnyResult,
        banner::{BannerInfo, print_banner},
        logger,
    },
    configs::Config,
    console::{ConsoleSession, spawn_stdin_reader},
    log_println,
    sounds::local::LocalSounds,
    store::CounterStore,
    transport::loopback::LoopbackTransport,
};
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log_println!("Using built-in defaults: {}", e);
            Config::default()
        }
    };

    logger::init(config.logging.as_ref());
    print_banner(&BannerInfo::default());

    let store = Arc::new(CounterStore::open(&config.storage.path)?);
    info!("Loaded play counts from {}", store.path().display());

    let sounds = Arc::new(LocalSounds::new(
        &config.sounds.directory,
        config.sounds.extension.clone(),
    ));
    info!("Serving sounds from {}", sounds.directory().display());

    let transport = Arc::new(LoopbackTransport::new(config.console.bitrate_kbps));
    let bot = Soundbot::new(&config, store, sounds, transport.clone(), transport);

    let (tx, rx) = flume::unbounded();
    spawn_stdin_reader(ConsoleSession::new(config.console.clone()), tx);

    tokio::select! {
        _ = bot.run(rx) => {}
        _ = tokio::signal::ctrl_c() => {
            bot.shutdown().await;
        }
    }

    Ok(())
}

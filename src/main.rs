use gambler_bot::{appstate, config::Config};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let config = Config::from_env()?;
    let app_state = appstate::new_real_appstate(config)?;
    let dispatcher = app_state.dispatcher()?;

    tokio::select! {
        result = dispatcher.run() => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

use lantern::config::Config;
use lantern::server::Server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let server = Server::bind(&cfg)?;
    let shutdown = server.shutdown_handle();

    let mut reactor = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        res = &mut reactor => {
            res??;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
            reactor.await??;
        }
    }

    Ok(())
}

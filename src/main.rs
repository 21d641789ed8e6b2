use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    corsgate_lib::run()
        .await
        .context("gateway failed to start")
}

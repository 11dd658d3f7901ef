use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    crosstalk_daemon::run().await?;
    Ok(())
}

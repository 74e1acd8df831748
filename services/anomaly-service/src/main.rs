use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    anomaly_service::run().await
}

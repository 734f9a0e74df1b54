use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    slm::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    research_services::app::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cart_tracker::run().await
}

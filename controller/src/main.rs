mod app;
mod http;
mod ir;
mod mqtt;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}

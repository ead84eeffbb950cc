use pharma_service::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    ServiceBuilder::new(config)
        .with_memory_resources()
        .build()
        .serve()
        .await
}

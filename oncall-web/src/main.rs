use oncall_core::{logging::init_tracing, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::load()?;
    init_tracing(&settings);

    oncall_web::serve(settings).await
}

use academy::App;
use academy::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let environment =
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    academy::logging::init_for_environment(&environment);

    let config = Config::from_env()?;
    let app = App::with_config(config).await?;
    app.run().await?;
    Ok(())
}

#[actix_rt::main]
async fn main() -> color_eyre::Result<()> {
    reel_rs::ReelConfiguration::build_default()?
        .install_tracing()?
        .install_metrics()?
        .run()
        .await
}

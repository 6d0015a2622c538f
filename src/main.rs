#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    sistemplate_server::run().await
}

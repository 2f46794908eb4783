#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    inspection_report_server::run().await
}

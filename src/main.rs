#[tokio::main]
async fn main() {
    if let Err(e) = toneseer_lib::run().await {
        log::error!("{}", e);
        eprintln!("toneseer: {}", e);
        std::process::exit(1);
    }
}

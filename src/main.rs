#[tokio::main]
async fn main() {
    if let Err(e) = ticketflow::run().await {
        eprintln!("ticketflow: {e}");
        std::process::exit(1);
    }
}

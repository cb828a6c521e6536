#[tokio::main]
async fn main() {
    if let Err(e) = leadscore_lib::run().await {
        // The logger may not be initialized yet when settings fail to load
        eprintln!("leadscore: {}", e);
        std::process::exit(1);
    }
}

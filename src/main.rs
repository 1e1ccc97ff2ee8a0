// src/main.rs

use domd::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("domd error: {err:?}");
        std::process::exit(2);
    }

    match run(args).await {
        Ok(summary) if summary.all_working() => std::process::exit(0),
        Ok(summary) => {
            eprintln!("domd: {} broken command(s); see TODO.md", summary.broken);
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("domd error: {err:?}");
            std::process::exit(2);
        }
    }
}

//! Dockhand entry point
//!
//! Usage:
//! - `dockhand`                 run with config from the environment
//! - `dockhand --port 19999`    override the listening port

use dockhand::RuntimeConfig;

fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Dockhand - Docker management service");
    println!();
    println!("USAGE:");
    println!("    dockhand [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    DOCKHAND_API_KEY      API key for mutating endpoints");
    println!("    PORT                  Listening port (default 9850)");
    println!("    DOCKHAND_STACKS_DIR   Directory of compose stacks (default ./stacks)");
    println!("    DOCKHAND_AGENTS       Remote agents, name=url[|token],...");
    println!("    DOCKHAND_WEBHOOK_URL  Webhook notified when jobs finish");
}

fn main() {
    let config = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    rt.block_on(async {
        dockhand::init_and_run(config).await;
    });
}

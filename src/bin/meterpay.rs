//! Command line front end: validate inputs, run the purchase on a worker task
//! and ask before paying.

use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use meterpay::{
    parse_amount, spawn_purchase, validate_meter_number, CardCredentials, PortalConfig,
    PurchaseDetails, WorkflowEvent, DEFAULT_PORTAL_URL,
};

#[derive(Parser, Debug)]
#[command(
    name = "meterpay",
    version,
    about = "Buy a prepaid utility token from the payment portal"
)]
struct Cli {
    /// Meter number (digits only)
    #[arg(short, long)]
    meter: String,

    /// Amount in dollars, at least 5.00
    #[arg(short, long)]
    amount: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    visible: bool,

    /// Portal entry page
    #[arg(long, env = "METERPAY_URL", default_value = DEFAULT_PORTAL_URL)]
    url: String,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "meterpay=debug" } else { "meterpay=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let details = match purchase_details(&cli) {
        Ok(details) => details,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let config = PortalConfig {
        url: cli.url.clone(),
        headless: !cli.visible,
        ..Default::default()
    };

    let mut handle = spawn_purchase(config.engines.clone(), config, details);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut code = ExitCode::FAILURE;

    while let Some(event) = handle.next_event().await {
        match event {
            WorkflowEvent::Launched { engine } => println!("Browser started ({}).", engine),
            WorkflowEvent::AwaitingConfirmation(summary) => {
                println!("{}", summary);
                println!("Proceed? [y/N]");
                let answer = stdin.next_line().await.ok().flatten().unwrap_or_default();
                let approved = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
                let decided = if approved {
                    handle.confirm()
                } else {
                    handle.abandon()
                };
                if let Err(e) = decided {
                    eprintln!("Error: {}", e);
                }
            }
            WorkflowEvent::Succeeded(receipt) => {
                println!("Token: {}", receipt.token);
                code = ExitCode::SUCCESS;
            }
            WorkflowEvent::Failed(reason) => eprintln!("Error: {}", reason),
            WorkflowEvent::Abandoned => {
                println!("Payment cancelled.");
                code = ExitCode::SUCCESS;
            }
        }
    }

    handle.join().await;
    code
}

fn purchase_details(cli: &Cli) -> meterpay::Result<PurchaseDetails> {
    validate_meter_number(&cli.meter)?;
    let amount = parse_amount(&cli.amount)?;
    let card = CardCredentials::from_env()?;
    PurchaseDetails::new(&cli.meter, amount, card)
}

//! `alterego ask` — one question, one answer.

use alterego_core::error::Error;
use tokio_util::sync::CancellationToken;

pub async fn run(message: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let agent = super::build_loop(&config)?;
    let cancel = CancellationToken::new();

    eprint!("  Thinking...");
    let result = tokio::select! {
        result = agent.respond(&message, &[], &cancel) => result,
        _ = super::ctrl_c() => {
            cancel.cancel();
            Err(Error::Cancelled)
        }
    };
    eprint!("\r              \r");

    println!("{}", result?);
    Ok(())
}

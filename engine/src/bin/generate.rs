use std::time::Duration;

use clap::Parser;
use color_eyre::{Result, eyre::bail};
use engine::{
    GenerationResult, HttpGateway, Model, ResilientInvoker, RetryPolicy,
    invoker::{AttemptOutcome, CallOptions},
};
use tokio_util::sync::CancellationToken;

#[derive(clap::Parser)]
struct Arg {
    prompt: String,

    #[arg(short, long, default_value_t = Model::default())]
    model: Model,

    #[arg(short, long, default_value = "http://localhost:5000")]
    gateway_url: String,

    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    timeout_secs: Option<u64>,

    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let Arg {
        prompt,
        model,
        gateway_url,
        timeout_secs,
        max_attempts,
    } = Arg::parse();

    let invoker = ResilientInvoker::new(HttpGateway::new(&gateway_url), RetryPolicy::default());
    let options = CallOptions {
        attempt_timeout: timeout_secs.map(Duration::from_secs),
        max_attempts,
    };

    let cancel = CancellationToken::new();
    let report = tokio::select! {
        report = invoker.generate_traced(&prompt, model, options, &cancel) => report,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    };

    for attempt in &report.attempts {
        let status = match &attempt.outcome {
            AttemptOutcome::Success => "ok".to_string(),
            AttemptOutcome::RetryableFailure(e) | AttemptOutcome::FatalFailure(e) => e.to_string(),
        };
        println!(
            "Attempt {}: {status} (backoff: {:?})",
            attempt.number, attempt.backoff
        );
    }

    match report.result {
        GenerationResult::Success { url } => println!("{url}"),
        GenerationResult::Failure { kind, message } => bail!("{kind}: {message}"),
    }

    Ok(())
}

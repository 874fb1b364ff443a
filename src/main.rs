use anyhow::Result;
use clap::Parser;
use qa_reader::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("qa_reader=info".parse()?),
        )
        .init();

    Cli::parse().run()
}

use dotprompt_gen::cli::CommandLineInterface;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let command_line_interface = CommandLineInterface::load();
    init_logging(command_line_interface.verbose());
    command_line_interface.run()
}

/// Logs go to stderr; stdout carries generated output.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "dotprompt_gen=debug" } else { "dotprompt_gen=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

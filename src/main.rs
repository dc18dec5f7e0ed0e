use clap::Parser;
use miette::Result;
use partmaster::cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(global.verbose);

    match cli.command {
        Commands::Migrate => partmaster::cli::commands::migrate::run(&global),
        Commands::Bootstrap(args) => partmaster::cli::commands::bootstrap::run(args, &global),
        Commands::Status => partmaster::cli::commands::status::run(&global),
        Commands::Part(args) => partmaster::cli::commands::part::run(args, &global),
        Commands::Asset(cmd) => partmaster::cli::commands::asset::run(cmd, &global),
        Commands::Reset(args) => partmaster::cli::commands::reset::run(args, &global),
    }
}

/// Logs go to stderr; `PARTMASTER_LOG` overrides the level
fn init_logging(verbose: bool) {
    let default = if verbose { "partmaster=debug" } else { "partmaster=info" };
    let filter = EnvFilter::try_from_env("PARTMASTER_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

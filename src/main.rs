use clap::{Parser, Subcommand};
use stepwise::{library, Expr, Runner, TraceOrder, TraceSource};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Evaluate a library function and print the assertions crossed on the way.
#[derive(Parser)]
#[command(name = "stepwise", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit deeper calls before the calls that depend on them
    #[arg(long, global = true)]
    innermost_first: bool,

    /// Assert on every reduced call argument too, not only calls and slices
    #[arg(long, global = true)]
    log: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// bytes.SpecSplit(input, sep)
    Split { input: String, sep: String },
    /// bytes.SpecRepeat(input, count)
    Repeat { input: String, count: i64 },
    /// ToPath(path)
    Path { path: String },
}

impl Command {
    fn expr(&self) -> Expr {
        match self {
            Command::Split { input, sep } => Expr::call(
                "bytes.SpecSplit",
                [library::bytes(input), library::bytes(sep)],
            ),
            Command::Repeat { input, count } => Expr::call(
                "bytes.SpecRepeat",
                [library::bytes(input), Expr::int(*count)],
            ),
            Command::Path { path } => Expr::call("ToPath", [library::bytes(path)]),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> stepwise::EvalResult<()> {
    let registry = library::registry()?;
    let runner = Runner::new(&registry)
        .order(if cli.innermost_first {
            TraceOrder::InnermostFirst
        } else {
            TraceOrder::OutermostFirst
        })
        .source(if cli.log {
            TraceSource::Log
        } else {
            TraceSource::Steps
        });

    let expr = cli.command.expr();
    tracing::info!("evaluating {}", expr);

    let t = std::time::Instant::now();
    let ex = runner.extract(&expr)?;
    tracing::info!(micros = t.elapsed().as_micros() as u64, "extracted {} assertions", ex.assertions.len());

    if cli.json {
        println!("{}", ex.to_json());
    } else {
        println!("{} == {}", expr, ex.value);
        println!();
        for a in &ex.assertions {
            println!("{}", a);
        }
    }

    Ok(())
}

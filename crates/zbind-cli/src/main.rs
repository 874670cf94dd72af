use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zbind::Config;

#[derive(Debug, Parser)]
#[command(
    name = "zbind",
    version,
    about = "Check and reformat XML documents"
)]
struct Args {
    /// Input file (defaults to stdin)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
    /// Indent nested elements on separate lines
    #[arg(short, long)]
    pretty: bool,
    /// Indent with this many spaces instead of a tab
    #[arg(long, value_name = "N", requires = "pretty")]
    indent_width: Option<usize>,
    /// Use CRLF line breaks when pretty printing
    #[arg(long, requires = "pretty")]
    crlf: bool,
    /// Always write the `<?xml ...?>` declaration
    #[arg(long)]
    declaration: bool,
    /// Only check that the input is well formed
    #[arg(long, conflicts_with = "output")]
    check: bool,
    /// Log parser activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::new().with_pretty_print(self.pretty);
        if let Some(width) = self.indent_width {
            config = config.with_indent_symbol(" ".repeat(width));
        }
        if self.crlf {
            config = config.with_line_symbol("\r\n");
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let input = read_input(&args.input)?;
    let config = args.config();
    let mut doc = zbind::Parser::with_config(&input, &config)
        .parse()
        .with_context(|| format!("failed to parse {}", describe(&args.input)))?;
    info!(elements = doc.node_count(), "document parsed");

    if args.check {
        let root = doc.root_element().name().to_string();
        return write_output(&None, format!("ok: <{root}> well formed\n").as_bytes());
    }

    if args.declaration {
        doc.set_emit_declaration(true);
    }
    let mut output = zbind::xml::writer::to_string(&doc, &config);
    output.push_str(config.line_symbol());
    debug!(bytes = output.len(), "document rendered");

    write_output(&args.output, output.as_bytes())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "zbind=debug" } else { "zbind=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn describe(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "stdin".to_string(),
    }
}

fn read_input(path: &Option<PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read stdin")?;
            if buffer.iter().all(u8::is_ascii_whitespace) {
                bail!("no input provided on stdin");
            }
            Ok(buffer)
        }
    }
}

fn write_output(path: &Option<PathBuf>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(data).context("failed to write stdout")?;
            Ok(())
        }
    }
}

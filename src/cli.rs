use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(
    name = "tupisec",
    author,
    version,
    about = "TupiSec - Web Security Analysis Framework",
    long_about = None,
    after_help = "EXAMPLES:
  Full scan with a saved report:
    tupisec https://example.com --output report.txt

  Machine-readable output for a driving program:
    tupisec https://example.com --json-stdout --quiet

  Authenticated scan with progress lines:
    tupisec https://example.com --cookies \"session=abc; token=xyz\" --progress"
)]
pub struct Cli {
    /// Target URL to scan
    pub url: String,

    /// Run the full scan (default behavior)
    #[arg(long)]
    pub full: bool,

    /// Output report file; a JSON report is written beside it
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Quiet mode: suppress progress logs
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Emit the final JSON report to stdout
    #[arg(long)]
    pub json_stdout: bool,

    /// Emit PROGRESS:{...} lines per phase
    #[arg(long)]
    pub progress: bool,

    /// Cookie header string (e.g. 'session=abc; token=xyz')
    #[arg(long)]
    pub cookies: Option<String>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

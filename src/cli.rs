use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile a typed script AST to stack-VM assembly")]
pub struct Cli {
    /// Input .json AST produced by the script parser
    pub input: PathBuf,
    /// Output assembly file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Catalog overlay (.json), applied over the built-in catalog in order
    #[arg(long = "catalog", value_name = "FILE")]
    pub catalogs: Vec<PathBuf>,
    /// Also write the linked program as postcard records
    #[arg(long, value_name = "FILE")]
    pub records: Option<PathBuf>,
    /// Print an address listing to stderr
    #[arg(long)]
    pub listing: bool,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

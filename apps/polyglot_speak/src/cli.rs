use clap::Parser;
use std::path::PathBuf;

/// Read text from stdin and speak each span in the language detected for it
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "polyglot-speak", version, about)]
pub struct Cli {
    /// A list of languages used for language detection. Specify as a
    /// comma-separated list (i.e. English,Spanish,French)
    #[arg(long = "use-languages", value_name = "LIST", value_delimiter = ',')]
    pub use_languages: Vec<String>,

    /// Print out supported languages and exit
    #[arg(long)]
    pub list_languages: bool,

    /// TOML configuration file (default: polyglot.toml or $POLYGLOT_CONFIG)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Speech Dispatcher output module
    #[arg(long, value_name = "NAME")]
    pub output_module: Option<String>,

    /// Speech Dispatcher address, e.g. unix_socket:/path or inet_socket:host:port
    #[arg(long, value_name = "ADDR")]
    pub address: Option<String>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}

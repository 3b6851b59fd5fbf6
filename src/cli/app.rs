use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "idbx")]
#[command(about = "Chromium IndexedDB backing store recovery toolkit")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Log decoding details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Byte order of fixed-width integers (key prefixes, metadata ints)
    #[arg(long = "int-order", default_value = "little", global = true)]
    pub int_order: ByteOrder,

    /// Byte order of host-native fields (doubles, two-byte strings)
    #[arg(long = "host-order", default_value = "little", global = true)]
    pub host_order: ByteOrder,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
pub enum ByteOrder {
    Little,
    Big,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild databases, object stores and records from a key/value dump
    Scan {
        /// Path to a text dump ('<hex key> <hex value>' per line)
        #[arg(short, long)]
        file: String,

        /// List every record under its object store
        #[arg(short, long)]
        records: bool,

        /// Number of decode threads (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Classify and describe one encoded key
    Key {
        /// Key bytes in hex
        hex: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Decode one structured clone value
    Value {
        /// Value bytes in hex
        hex: String,

        /// Strip the leading record version varint first
        #[arg(short, long)]
        record: bool,

        /// Show a hex dump of the input
        #[arg(long)]
        dump: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compare two keys with the idb_cmp1 ordering
    Compare {
        /// First key in hex
        a: String,

        /// Second key in hex
        b: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Verify that a dump is sorted under idb_cmp1
    CheckOrder {
        /// Path to a text dump ('<hex key> <hex value>' per line)
        #[arg(short, long)]
        file: String,

        /// Stop after this many inversions (default: report all)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

use anyhow::bail;
use clap::{Args, Parser, Subcommand, ValueEnum};
use flakeid::{Layout, Snowflake};

/// Command-line arguments for the `flakeid` binary.
///
/// Every option can also come from the environment (or a `.env` file), which
/// is how a deployment pins its layout and worker identity once instead of
/// repeating them on every call.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flakeid",
    version,
    about = "Generate, decode, and convert layout-driven Snowflake IDs"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// How IDs and decoded fields are printed.
    ///
    /// Environment variable: `FLAKEID_FORMAT`
    #[arg(long, env = "FLAKEID_FORMAT", value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    /// Emit logs as JSON lines on stderr.
    ///
    /// Environment variable: `FLAKEID_LOG_JSON`
    #[arg(long, env = "FLAKEID_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Source layout shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Layout preset. `custom` requires `--epoch`.
    ///
    /// Environment variable: `FLAKEID_LAYOUT`
    #[arg(long = "layout", env = "FLAKEID_LAYOUT", value_enum, default_value_t = LayoutPreset::Twitter)]
    pub preset: LayoutPreset,

    /// Epoch in milliseconds since the UNIX epoch. Overrides a preset's epoch.
    ///
    /// Environment variable: `FLAKEID_EPOCH`
    #[arg(long, env = "FLAKEID_EPOCH", allow_negative_numbers = true)]
    pub epoch: Option<i64>,

    /// Timestamp width in bits (`custom` only, default 42).
    ///
    /// Environment variable: `FLAKEID_TIMESTAMP_BITS`
    #[arg(long, env = "FLAKEID_TIMESTAMP_BITS")]
    pub timestamp_bits: Option<u8>,

    /// Worker ID width in bits (`custom` only, default 5).
    ///
    /// Environment variable: `FLAKEID_WORKER_BITS`
    #[arg(long, env = "FLAKEID_WORKER_BITS")]
    pub worker_bits: Option<u8>,

    /// Process ID width in bits (`custom` only, default 5).
    ///
    /// Environment variable: `FLAKEID_PROCESS_BITS`
    #[arg(long, env = "FLAKEID_PROCESS_BITS")]
    pub process_bits: Option<u8>,

    /// Sequence width in bits (`custom` only, default 12).
    ///
    /// Environment variable: `FLAKEID_INCREMENT_BITS`
    #[arg(long, env = "FLAKEID_INCREMENT_BITS")]
    pub increment_bits: Option<u8>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate new IDs.
    Generate {
        /// Number of IDs to generate.
        ///
        /// Environment variable: `FLAKEID_COUNT`
        #[arg(short = 'n', long, env = "FLAKEID_COUNT", default_value_t = 1)]
        count: usize,

        /// Worker ID embedded in every generated ID.
        ///
        /// Environment variable: `FLAKEID_WORKER_ID`
        #[arg(short, long, env = "FLAKEID_WORKER_ID", default_value_t = 0)]
        worker_id: u64,

        /// Process ID embedded in every generated ID.
        ///
        /// Environment variable: `FLAKEID_PROCESS_ID`
        #[arg(short, long, env = "FLAKEID_PROCESS_ID", default_value_t = 0)]
        process_id: u64,

        /// Pull IDs from an async stream instead of one request at a time.
        #[arg(long, default_value_t = false)]
        stream: bool,
    },

    /// Decode an ID into its timestamp, worker, process, and sequence fields.
    Decompose {
        /// The ID as a base-10 integer.
        #[arg(allow_negative_numbers = true)]
        id: String,
    },

    /// Re-encode an ID from the source layout into another layout.
    Convert {
        /// The ID as a base-10 integer.
        #[arg(allow_negative_numbers = true)]
        id: String,

        /// Destination layout preset. `custom` requires `--to-epoch`.
        #[arg(long, value_enum)]
        to: LayoutPreset,

        /// Destination epoch in milliseconds since the UNIX epoch.
        #[arg(long, allow_negative_numbers = true)]
        to_epoch: Option<i64>,

        /// Destination timestamp width (`custom` only).
        #[arg(long)]
        to_timestamp_bits: Option<u8>,

        /// Destination worker ID width (`custom` only).
        #[arg(long)]
        to_worker_bits: Option<u8>,

        /// Destination process ID width (`custom` only).
        #[arg(long)]
        to_process_bits: Option<u8>,

        /// Destination sequence width (`custom` only).
        #[arg(long)]
        to_increment_bits: Option<u8>,
    },

    /// Print the source layout's limits.
    Describe,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPreset {
    Twitter,
    Discord,
    Custom,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Base-10 integers.
    Plain,
    /// Zero-padded 20 digit strings. Non-negative IDs sort lexicographically.
    Padded,
    /// One JSON object per line.
    Json,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub layout: Layout,
    pub format: OutputFormat,
    pub log_json: bool,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Generate {
        count: usize,
        worker_id: u64,
        process_id: u64,
        stream: bool,
    },
    Decompose {
        id: Snowflake,
    },
    Convert {
        id: Snowflake,
        to: Layout,
    },
    Describe,
}

struct LayoutSpec {
    preset: LayoutPreset,
    epoch: Option<i64>,
    timestamp_bits: Option<u8>,
    worker_bits: Option<u8>,
    process_bits: Option<u8>,
    increment_bits: Option<u8>,
}

impl LayoutSpec {
    fn resolve(self, flag_prefix: &str) -> anyhow::Result<Layout> {
        let has_widths = self.timestamp_bits.is_some()
            || self.worker_bits.is_some()
            || self.process_bits.is_some()
            || self.increment_bits.is_some();

        let base = match self.preset {
            LayoutPreset::Twitter => Layout::TWITTER,
            LayoutPreset::Discord => Layout::DISCORD,
            LayoutPreset::Custom => {
                let mut builder = Layout::builder();
                if let Some(epoch) = self.epoch {
                    builder = builder.epoch(epoch);
                }
                if let Some(bits) = self.timestamp_bits {
                    builder = builder.timestamp_bits(bits);
                }
                if let Some(bits) = self.worker_bits {
                    builder = builder.worker_bits(bits);
                }
                if let Some(bits) = self.process_bits {
                    builder = builder.process_bits(bits);
                }
                if let Some(bits) = self.increment_bits {
                    builder = builder.increment_bits(bits);
                }
                return Ok(builder.build()?);
            }
        };

        if has_widths {
            bail!("{flag_prefix}*-bits options require the custom layout");
        }
        // Both presets use the default split, so only the epoch can move.
        Ok(match self.epoch {
            Some(epoch) => Layout::from_epoch(epoch),
            None => base,
        })
    }
}

fn parse_id(text: &str) -> anyhow::Result<Snowflake> {
    Ok(text.trim().parse::<Snowflake>()?)
}

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let layout = LayoutSpec {
            preset: args.layout.preset,
            epoch: args.layout.epoch,
            timestamp_bits: args.layout.timestamp_bits,
            worker_bits: args.layout.worker_bits,
            process_bits: args.layout.process_bits,
            increment_bits: args.layout.increment_bits,
        }
        .resolve("--")?;

        let task = match args.command {
            Command::Generate {
                count,
                worker_id,
                process_id,
                stream,
            } => {
                if count == 0 {
                    bail!("FLAKEID_COUNT must be greater than 0");
                }
                if worker_id >= layout.max_workers() {
                    bail!(
                        "FLAKEID_WORKER_ID ({}) exceeds the layout's worker ID space (max = {})",
                        worker_id,
                        layout.max_workers() - 1
                    );
                }
                if process_id >= layout.max_processes() {
                    bail!(
                        "FLAKEID_PROCESS_ID ({}) exceeds the layout's process ID space (max = {})",
                        process_id,
                        layout.max_processes() - 1
                    );
                }
                Task::Generate {
                    count,
                    worker_id,
                    process_id,
                    stream,
                }
            }
            Command::Decompose { id } => Task::Decompose { id: parse_id(&id)? },
            Command::Convert {
                id,
                to,
                to_epoch,
                to_timestamp_bits,
                to_worker_bits,
                to_process_bits,
                to_increment_bits,
            } => Task::Convert {
                id: parse_id(&id)?,
                to: LayoutSpec {
                    preset: to,
                    epoch: to_epoch,
                    timestamp_bits: to_timestamp_bits,
                    worker_bits: to_worker_bits,
                    process_bits: to_process_bits,
                    increment_bits: to_increment_bits,
                }
                .resolve("--to-")?,
            },
            Command::Describe => Task::Describe,
        };

        Ok(Self {
            layout,
            format: args.format,
            log_json: args.log_json,
            task,
        })
    }
}

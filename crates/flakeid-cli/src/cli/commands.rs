use std::{
    io::{BufWriter, Write},
    pin::pin,
    time::{Duration, Instant, UNIX_EPOCH},
};

use flakeid::{Layout, Parts, Snowflake, SnowflakeGenerator, SnowflakeGeneratorAsyncTokioExt};
use futures::TryStreamExt;
use serde::Serialize;

use crate::cli::config::{Config, OutputFormat, Task};

#[derive(Serialize)]
struct Decoded {
    #[serde(with = "flakeid::serde::as_string")]
    id: Snowflake,
    #[serde(flatten)]
    parts: Parts,
}

#[derive(Serialize)]
struct Converted {
    #[serde(with = "flakeid::serde::as_string")]
    from: Snowflake,
    #[serde(with = "flakeid::serde::as_string")]
    to: Snowflake,
}

#[derive(Serialize)]
struct Limits {
    epoch: i64,
    timestamp_bits: u8,
    worker_bits: u8,
    process_bits: u8,
    increment_bits: u8,
    max_workers: u64,
    max_processes: u64,
    max_generators: u64,
    max_increments: u64,
    max_timestamps: u64,
    /// First millisecond (since the UNIX epoch) the timestamp field cannot hold.
    overflows_at: Option<u128>,
}

impl From<&Layout> for Limits {
    fn from(layout: &Layout) -> Self {
        use flakeid::Field;
        Self {
            epoch: layout.epoch(),
            timestamp_bits: layout.bits(Field::Timestamp),
            worker_bits: layout.bits(Field::WorkerId),
            process_bits: layout.bits(Field::ProcessId),
            increment_bits: layout.bits(Field::Increment),
            max_workers: layout.max_workers(),
            max_processes: layout.max_processes(),
            max_generators: layout.max_generators(),
            max_increments: layout.max_increments(),
            max_timestamps: layout.max_timestamps(),
            overflows_at: layout
                .time_overflow_instant()
                .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
                .map(|since| since.as_millis()),
        }
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match config.task {
        Task::Generate {
            count,
            worker_id,
            process_id,
            stream,
        } => {
            let generator = SnowflakeGenerator::new(config.layout, worker_id, process_id)?;
            let started = Instant::now();
            let emit = |id| write_id(&mut out, config.format, &config.layout, id);
            if stream {
                generate_streamed(&generator, count, emit).await?;
            } else {
                generate_each(&generator, count, emit).await?;
            }
            log_generated(count, started.elapsed());
        }
        Task::Decompose { id } => {
            let parts = id.decompose(&config.layout);
            match config.format {
                OutputFormat::Json => {
                    serde_json::to_writer(&mut out, &Decoded { id, parts })?;
                    writeln!(out)?;
                }
                OutputFormat::Plain | OutputFormat::Padded => {
                    writeln!(out, "timestamp={}", parts.timestamp)?;
                    writeln!(out, "worker_id={}", parts.worker_id)?;
                    writeln!(out, "process_id={}", parts.process_id)?;
                    writeln!(out, "increment={}", parts.increment)?;
                }
            }
        }
        Task::Convert { id, to } => {
            let converted = id.convert(&config.layout, &to);
            if converted.decompose(&to) != id.decompose(&config.layout) {
                tracing::warn!(
                    %id,
                    %converted,
                    "fields did not fit the destination layout and were truncated"
                );
            }
            match config.format {
                OutputFormat::Json => {
                    serde_json::to_writer(
                        &mut out,
                        &Converted {
                            from: id,
                            to: converted,
                        },
                    )?;
                    writeln!(out)?;
                }
                OutputFormat::Plain => writeln!(out, "{converted}")?,
                OutputFormat::Padded => writeln!(out, "{}", converted.to_padded_string())?,
            }
        }
        Task::Describe => {
            let limits = Limits::from(&config.layout);
            match config.format {
                OutputFormat::Json => {
                    serde_json::to_writer(&mut out, &limits)?;
                    writeln!(out)?;
                }
                OutputFormat::Plain | OutputFormat::Padded => {
                    let value = serde_json::to_value(&limits)?;
                    if let serde_json::Value::Object(fields) = value {
                        for (key, value) in fields {
                            writeln!(out, "{key}={value}")?;
                        }
                    }
                }
            }
        }
    }

    out.flush()?;
    Ok(())
}

/// Hands each ID to `emit` as soon as it is generated.
async fn generate_each(
    generator: &SnowflakeGenerator,
    count: usize,
    mut emit: impl FnMut(Snowflake) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    for _ in 0..count {
        emit(SnowflakeGeneratorAsyncTokioExt::try_next_id_async(generator).await?)?;
    }
    Ok(())
}

/// Like [`generate_each`], pulling from the generator's stream.
async fn generate_streamed(
    generator: &SnowflakeGenerator,
    count: usize,
    mut emit: impl FnMut(Snowflake) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    use futures::StreamExt;
    let mut ids = pin!(SnowflakeGeneratorAsyncTokioExt::stream(generator).take(count));
    while let Some(id) = ids.try_next().await? {
        emit(id)?;
    }
    Ok(())
}

fn write_id(
    out: &mut impl Write,
    format: OutputFormat,
    layout: &Layout,
    id: Snowflake,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Plain => writeln!(out, "{id}")?,
        OutputFormat::Padded => writeln!(out, "{}", id.to_padded_string())?,
        OutputFormat::Json => {
            serde_json::to_writer(
                &mut *out,
                &Decoded {
                    id,
                    parts: id.decompose(layout),
                },
            )?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn log_generated(count: usize, elapsed: Duration) {
    tracing::info!(count, elapsed_us = elapsed.as_micros() as u64, "generated ids");
}

//! Subcommand implementations.

use std::io::{Read, Write};
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args as ClapArgs;
use color_eyre::eyre::WrapErr;
use flightlink_core::messaging::Correlation;
use flightlink_core::{Envelope, FlightCorrelationKey, FlightLink, OutboundMessage};
use serde::Serialize;

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(ClapArgs, Debug)]
pub struct SealArgs {
    /// Recipient peer id (IATA code)
    #[arg(long)]
    pub target: String,

    /// Payload file; stdin when omitted or "-"
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Metadata entry, repeatable
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub metadata: Vec<(String, String)>,

    /// Explicit correlation key (instead of flight fields)
    #[arg(long, conflicts_with_all = ["airline", "flight_number", "origin_date", "departure", "arrival"])]
    pub correlation_key: Option<String>,

    #[arg(long)]
    pub airline: Option<String>,

    #[arg(long)]
    pub flight_number: Option<String>,

    /// Scheduled departure date, UTC (YYYY-MM-DD)
    #[arg(long)]
    pub origin_date: Option<NaiveDate>,

    #[arg(long)]
    pub departure: Option<String>,

    #[arg(long)]
    pub arrival: Option<String>,

    #[arg(long)]
    pub suffix: Option<String>,

    #[arg(long)]
    pub repeat_number: Option<u32>,
}

#[derive(ClapArgs, Debug)]
pub struct OpenArgs {
    /// Envelope JSON file; stdin when omitted or "-"
    #[arg(long)]
    pub input: Option<PathBuf>,
}

/// Printed by `seal` for the transport to pick up
#[derive(Debug, Serialize)]
struct SealOutput<'a> {
    address: &'a str,
    envelope: &'a Envelope,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn run(link: &FlightLink) -> color_eyre::Result<()> {
    link.start().wrap_err("Background tasks could not start")?;

    if let Some(own_config) = link.own_config() {
        match own_config.get().await {
            Ok(snapshot) => tracing::info!(
                inbound_queue = %snapshot.inbound_queue,
                outbound_queue = ?snapshot.outbound_queue,
                "Own configuration loaded"
            ),
            Err(e) => tracing::warn!(error = %e, "Own configuration unavailable, will retry"),
        }
    }

    tracing::info!(
        peer_id = %link.directory().local_peer_id(),
        "FlightLink node running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for Ctrl-C")?;

    link.shutdown().await;
    Ok(())
}

pub async fn seal(link: &FlightLink, args: SealArgs) -> color_eyre::Result<()> {
    let payload = read_input(args.input.as_ref())?;
    let correlation = correlation(&args)?;

    let mut message = OutboundMessage::new(args.target, payload, correlation);
    for (key, value) in args.metadata {
        message = message.with_metadata(key, value);
    }

    let outbound = link.assembler().seal(message).await?;

    let output = SealOutput {
        address: &outbound.address,
        envelope: &outbound.envelope,
    };
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &output)?;
    writeln!(stdout)?;
    Ok(())
}

pub fn open(link: &FlightLink, args: OpenArgs) -> color_eyre::Result<()> {
    let raw = read_input(args.input.as_ref())?;
    let json = String::from_utf8(raw).wrap_err("Envelope is not UTF-8")?;

    let inbound = link.assembler().open_json(&json)?;
    tracing::info!(
        correlation_key = %inbound.correlation_key,
        metadata = ?inbound.metadata,
        "Envelope opened"
    );

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&inbound.plaintext)?;
    stdout.flush()?;
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn correlation(args: &SealArgs) -> color_eyre::Result<Correlation> {
    if let Some(ref key) = args.correlation_key {
        return Ok(Correlation::Key(key.clone()));
    }

    let mut builder = FlightCorrelationKey::builder();
    if let Some(ref airline) = args.airline {
        builder = builder.airline(airline);
    }
    if let Some(ref number) = args.flight_number {
        builder = builder.flight_number(number);
    }
    if let Some(date) = args.origin_date {
        builder = builder.origin_date(date);
    }
    if let Some(ref departure) = args.departure {
        builder = builder.departure_airport(departure);
    }
    if let Some(ref arrival) = args.arrival {
        builder = builder.arrival_airport(arrival);
    }
    if let Some(ref suffix) = args.suffix {
        builder = builder.suffix(suffix);
    }
    if let Some(repeat) = args.repeat_number {
        builder = builder.repeat_number(repeat);
    }

    Ok(Correlation::Flight(builder.build().wrap_err(
        "Provide --correlation-key or the flight fields (--airline, --origin-date, --departure, --arrival)",
    )?))
}

fn read_input(path: Option<&PathBuf>) -> color_eyre::Result<Vec<u8>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            std::fs::read(path).wrap_err_with(|| format!("Cannot read {}", path.display()))
        }
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .wrap_err("Cannot read stdin")?;
            Ok(buf)
        }
    }
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("metadata key must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seal_args(extra: &[&str]) -> SealArgs {
        #[derive(clap::Parser)]
        struct Wrapper {
            #[command(flatten)]
            seal: SealArgs,
        }
        let mut argv = vec!["seal", "--target", "C1"];
        argv.extend_from_slice(extra);
        <Wrapper as clap::Parser>::try_parse_from(argv).unwrap().seal
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("message_type=FlightLegNotif").unwrap(),
            ("message_type".to_string(), "FlightLegNotif".to_string())
        );
        assert_eq!(parse_key_val("note=a=b").unwrap().1, "a=b");
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_correlation_from_flight_fields() {
        let args = seal_args(&[
            "--airline",
            "qr",
            "--flight-number",
            "96",
            "--origin-date",
            "2026-01-15",
            "--departure",
            "sfo",
            "--arrival",
            "lhr",
        ]);
        let key = correlation(&args).unwrap().to_key_id().unwrap();
        assert_eq!(key, "QR-0096-20260115-SFO-LHR");
    }

    #[test]
    fn test_explicit_correlation_key() {
        let args = seal_args(&["--correlation-key", "t2", "--meta", "message_type=X"]);
        assert_eq!(correlation(&args).unwrap(), Correlation::Key("t2".into()));
        assert_eq!(args.metadata, vec![("message_type".into(), "X".into())]);
    }

    #[test]
    fn test_incomplete_flight_fields_rejected() {
        let args = seal_args(&["--airline", "QR"]);
        assert!(correlation(&args).is_err());
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.xml");
        std::fs::write(&path, b"<FlightLegNotifRQ/>").unwrap();

        assert_eq!(read_input(Some(&path)).unwrap(), b"<FlightLegNotifRQ/>");
        assert!(read_input(Some(&dir.path().join("missing.xml"))).is_err());
    }
}

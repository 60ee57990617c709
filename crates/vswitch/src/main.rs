#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vswitch::Pump;
use vswitch_core::{PortSpec, PortTable, Switch, SwitchConfig, DEFAULT_FDB_CAPACITY};

/// User-space VLAN-aware Ethernet switch.
///
/// Speaks the network driver's length-prefixed envelope protocol on
/// stdin/stdout. Diagnostics go to stderr (stdout is the frame stream).
#[derive(Debug, Parser)]
#[command(name = "vswitch", version, about)]
struct Cli {
    /// Port specifications: NAME, NAME[U:VID] or NAME[T:VID,VID,...].
    #[arg(required = true, value_name = "PORTSPEC")]
    ports: Vec<String>,

    /// Number of slots in the MAC learning table.
    #[arg(long, default_value_t = DEFAULT_FDB_CAPACITY)]
    fdb_capacity: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if cli.fdb_capacity == 0 {
        eprintln!("vswitch: --fdb-capacity must be at least 1");
        return ExitCode::FAILURE;
    }

    let mut specs = Vec::with_capacity(cli.ports.len());
    for (i, arg) in cli.ports.iter().enumerate() {
        match arg.parse::<PortSpec>() {
            Ok(spec) => specs.push(spec),
            Err(err) => {
                eprintln!("vswitch: port spec #{}: {err}", i + 1);
                return ExitCode::FAILURE;
            }
        }
    }

    let ports = PortTable::from_specs(specs);
    for port in ports.iter() {
        tracing::info!(
            index = port.index(),
            name = port.name(),
            untagged_vlan = ?port.untagged_vlan().map(|v| v.as_u16()),
            tagged_vlans = ?port
                .tagged_vlans()
                .iter()
                .map(|v| v.as_u16())
                .collect::<Vec<_>>(),
            "port configured"
        );
    }

    let switch = Switch::with_config(
        ports,
        SwitchConfig {
            fdb_capacity: cli.fdb_capacity,
        },
    );

    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    match Pump::new(switch, stdin, stdout).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}

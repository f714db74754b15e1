use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use log::{info, warn};
use netsweep::credentials::{Prompter, TerminalPrompter};
use netsweep::output::DEFAULT_DIR;
use netsweep::{
    AuthMode, BulkRunner, CommandCatalog, CommandPlanner, CredentialConfig, CredentialResolver,
    DeviceClassifier, DeviceJob, DeviceList, DeviceType, EmptyOutputPolicy, NeighborDiscovery,
    Outcome, ResultWriter, RunOptions, RunReport, SshConfig, SshConnector,
};

/// Collect show-command output from network devices, or seed a device list
/// from a core device's CDP neighbors.
#[derive(Parser, Debug)]
#[command(name = "netsweep", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run show commands on every device and save the output per device.
    Show(ShowArgs),

    /// Discover CDP neighbors of a seed device and save them as a device list.
    Seed(SeedArgs),
}

#[derive(Args, Debug)]
struct AuthArgs {
    /// Multi-factor login: INET_USR / INET_PWD plus a one-time code.
    #[arg(short = 'm', long, conflicts_with = "credentials")]
    mfa: bool,

    /// Prompt for username, password and enable secret.
    #[arg(short = 'c', long)]
    credentials: bool,

    /// One-time code for --mfa; prompted when omitted.
    #[arg(long, requires = "mfa")]
    mfa_code: Option<String>,
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Device type for every device (cisco_ios, cisco_nxos, cisco_wlc, cisco_asa,
    /// silverpeak). Skips name-based classification.
    #[arg(short = 't', long)]
    device_type: Option<DeviceType>,

    /// SSH port.
    #[arg(short = 'p', long, default_value_t = 22)]
    port: u16,

    /// Output subdirectory.
    #[arg(short = 'o', long, default_value = DEFAULT_DIR)]
    output_subdir: PathBuf,

    /// Connect and login timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// A single device (FQDN or IP).
    #[arg(short = 'd', long)]
    device: Option<String>,

    /// Device list file: one device per line, or a JSON array.
    #[arg(short = 'f', long = "file")]
    files: Vec<PathBuf>,

    /// Read a pasted device list from standard input.
    #[arg(long)]
    stdin: bool,

    /// Run only this command instead of the catalog list.
    #[arg(short = 's', long)]
    show_cmd: Option<String>,

    /// Short note appended to output file names, e.g. "pre change".
    #[arg(short = 'n', long)]
    note: Option<String>,

    /// Command catalog YAML; the bundled catalog when omitted.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Devices processed at once.
    #[arg(short = 'w', long, default_value_t = 1)]
    workers: usize,

    /// Stop starting new devices after this many seconds.
    #[arg(long)]
    deadline: Option<u64>,

    /// Give up on a single device after this many seconds.
    #[arg(long)]
    device_timeout: Option<u64>,

    /// Also save templated command output as JSON.
    #[arg(long)]
    parsed: bool,

    /// Save output files even when a device returned nothing.
    #[arg(long)]
    keep_empty: bool,

    /// Run failed and skipped devices once more.
    #[arg(long)]
    retry_failed: bool,

    #[command(flatten)]
    connect: ConnectArgs,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// FQDN or IP of the seed device.
    seed: String,

    #[command(flatten)]
    connect: ConnectArgs,

    #[command(flatten)]
    auth: AuthArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Show(args) => show_command(args).await,
        Command::Seed(args) => seed_command(args).await,
    }
}

fn auth_mode(auth: &AuthArgs) -> Result<AuthMode> {
    if auth.mfa {
        let code = match &auth.mfa_code {
            Some(code) => code.clone(),
            None => TerminalPrompter
                .prompt_line("Security code", None)
                .context("Failed to read the one-time code")?,
        };
        return Ok(AuthMode::Mfa { code });
    }
    if auth.credentials {
        return Ok(AuthMode::Interactive);
    }
    Ok(AuthMode::Environment)
}

fn ssh_config(connect: &ConnectArgs) -> SshConfig {
    SshConfig::default().with_timeout(Duration::from_secs(connect.timeout))
}

fn collect_devices(args: &ShowArgs) -> Result<DeviceList> {
    let mut devices = DeviceList::new();

    if let Some(device) = &args.device {
        devices.push(device);
    }
    if args.stdin {
        if io::stdin().is_terminal() {
            eprintln!("Paste devices, one per line; end with Ctrl-D");
        }
        let mut block = String::new();
        io::stdin()
            .read_to_string(&mut block)
            .context("Failed to read devices from stdin")?;
        devices.extend_from_block(&block);
    }
    for file in &args.files {
        devices
            .extend_from_file(file)
            .with_context(|| format!("Failed to read device list {}", file.display()))?;
    }

    if devices.is_empty() {
        bail!("No devices given; use --device, --file or --stdin");
    }
    Ok(devices)
}

async fn show_command(args: ShowArgs) -> Result<()> {
    let devices = collect_devices(&args)?;

    let book = CredentialResolver::new(CredentialConfig::from_env_and_dotenv())
        .resolve_book(&auth_mode(&args.auth)?)
        .context("Failed to resolve credentials")?;

    let catalog = match &args.catalog {
        Some(path) => CommandCatalog::load(path)
            .with_context(|| format!("Failed to load command catalog {}", path.display()))?,
        None => CommandCatalog::builtin().context("Failed to load bundled command catalog")?,
    };
    let planner = CommandPlanner::new(catalog);
    let classifier = DeviceClassifier::new().with_port(args.connect.port);

    let mut jobs = Vec::with_capacity(devices.len());
    for device in devices {
        let profile = classifier.profile(&device, args.connect.device_type, &book);
        let batch = planner
            .plan(profile.device_type, args.show_cmd.as_deref())
            .context("Failed to plan commands")?;
        info!(
            "{}: {} as {}, {} commands",
            profile.device,
            profile.port,
            profile.device_type,
            batch.len()
        );
        jobs.push(DeviceJob::new(profile, batch).with_parsing(args.parsed));
    }

    let policy = if args.keep_empty {
        EmptyOutputPolicy::Keep
    } else {
        EmptyOutputPolicy::TreatAsFailure
    };
    let options = RunOptions {
        workers: args.workers.max(1),
        deadline: args.deadline.map(Duration::from_secs),
        device_timeout: args.device_timeout.map(Duration::from_secs),
        empty_output: policy,
    };

    let writer = ResultWriter::new(&args.connect.output_subdir)
        .with_note(args.note.clone())
        .with_policy(policy);
    writer
        .ensure_dir()
        .with_context(|| format!("Failed to create {}", writer.dir().display()))?;

    let runner = BulkRunner::new(SshConnector::new(ssh_config(&args.connect)), options);
    let cancel = runner.cancel_handle();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing devices already started");
            signal.cancel();
        }
    });

    let report = runner.run(jobs.clone()).await;
    print_summary(&report, &writer, args.parsed)?;

    if args.retry_failed && !report.retry_list().is_empty() {
        if cancel.is_cancelled() {
            println!("\nInterrupted; not retrying failed devices");
        } else {
            let retry = runner.rerun_failed(&report, &jobs).await;
            println!("\nRetry:");
            print_summary(&retry, &writer, args.parsed)?;
        }
    }

    Ok(())
}

/// Save each result and print one row per device.
fn print_summary(report: &RunReport, writer: &ResultWriter, parsed: bool) -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Device", "Result", "Detail"]);

    for result in &report.results {
        let saved = writer
            .write_result(result)
            .with_context(|| format!("Failed to save output for {}", result.device))?;
        let parsed_files = if parsed {
            writer
                .write_parsed_result(result)
                .with_context(|| format!("Failed to save parsed output for {}", result.device))?
                .len()
        } else {
            0
        };

        let (status, detail) = match (&result.outcome, saved) {
            (Outcome::ConnectionFailure { kind, message }, _) => {
                (kind.to_string(), message.clone())
            }
            (_, None) => ("no output".to_string(), "possible login issue".to_string()),
            (Outcome::CommandFailure { failed_commands, .. }, Some(path)) => (
                "partial".to_string(),
                format!("{} ({} failed)", path.display(), failed_commands.len()),
            ),
            (Outcome::Success(_), Some(path)) => ("ok".to_string(), path.display().to_string()),
        };
        let detail = match parsed_files {
            0 => detail,
            n => format!("{detail}; {n} parsed"),
        };
        table.add_row(vec![Cell::new(&result.device), Cell::new(status), Cell::new(detail)]);
    }
    for device in &report.skipped {
        table.add_row(vec![Cell::new(device), Cell::new("skipped"), Cell::new("not started")]);
    }

    println!("\n{table}");
    println!(
        "\n{} of {} devices collected",
        report.succeeded(),
        report.results.len() + report.skipped.len()
    );
    Ok(())
}

async fn seed_command(args: SeedArgs) -> Result<()> {
    let book = CredentialResolver::new(CredentialConfig::from_env_and_dotenv())
        .resolve_book(&auth_mode(&args.auth)?)
        .context("Failed to resolve credentials")?;

    let classifier = DeviceClassifier::new().with_port(args.connect.port);
    let profile = classifier.profile(
        &args.seed,
        Some(args.connect.device_type.unwrap_or_default()),
        &book,
    );

    let discovery = NeighborDiscovery::new(SshConnector::new(ssh_config(&args.connect)));
    let inventory = discovery
        .discover(&profile)
        .await
        .with_context(|| format!("Discovery from {} failed", profile.device))?;

    let writer = ResultWriter::new(&args.connect.output_subdir);
    let artifacts = writer
        .write_inventory(&inventory)
        .context("Failed to save discovery artifacts")?;

    let mut table = Table::new();
    table.set_header(vec!["FQDN", "Mgmt IP", "Platform"]);
    for record in inventory.entries.values() {
        table.add_row(vec![
            Cell::new(&record.neighbor_name),
            Cell::new(&record.management_address),
            Cell::new(&record.platform),
        ]);
    }
    println!(
        "\n{} ({}) CDP switch neighbors\n{table}",
        inventory.hostname, inventory.seed
    );
    println!("Total: {}", inventory.len());
    println!("\nDevice list saved at {}", artifacts.device_list.display());
    println!("Device map saved at {}", artifacts.device_map.display());
    println!("Text list saved at {}", artifacts.text_list.display());

    Ok(())
}

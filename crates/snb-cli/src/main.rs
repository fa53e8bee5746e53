use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::json;
use snb_core::{AutoBackup, Backups, Interval, Paths, SettingsStore, SlotState, View};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "snb",
    about = "Snapshot, browse and restore Subnautica save data",
    version
)]
struct Cli {
    /// Live save folder (defaults to the Steam SNAppData folder)
    #[arg(long, global = true, value_name = "DIR")]
    source: Option<PathBuf>,
    /// Folder holding snapshots, count.txt and options.json
    #[arg(long, global = true, value_name = "DIR")]
    backup_dir: Option<PathBuf>,
    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Zip the save folder into the next snapshot
    Create,
    /// List snapshots in sequence order
    List(OutputArgs),
    /// Show which save slots each snapshot has a screenshot for
    View(OutputArgs),
    /// Replace the save folder with a snapshot
    Load(LoadArgs),
    /// Take snapshots periodically until Enter is pressed
    Auto(AutoArgs),
    /// Show or change stored auto-backup options
    Settings(SettingsArgs),
}

#[derive(ClapArgs, Debug)]
struct OutputArgs {
    /// Emit JSON instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(ClapArgs, Debug)]
struct LoadArgs {
    /// Snapshot sequence number (SNAppData<SEQ>.zip)
    seq: u64,
    /// Confirm overwriting the current save folder
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[derive(ClapArgs, Debug)]
struct AutoArgs {
    /// Minutes between snapshots (1-60); defaults to the stored interval
    #[arg(long)]
    interval: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct SettingsArgs {
    /// Turn auto-backup on or off for the GUI
    #[arg(long)]
    enabled: Option<bool>,
    /// Minutes between snapshots (1-60)
    #[arg(long)]
    interval: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let paths = Paths::detect(cli.source, cli.backup_dir).unwrap_or_else(|e| fail(e));
    tracing::debug!(
        "source {}, backups {}",
        paths.source_dir.display(),
        paths.backup_dir.display()
    );
    match cli.cmd.unwrap_or(Cmd::List(OutputArgs { json: false })) {
        Cmd::Create => cmd_create(&paths),
        Cmd::List(a) => cmd_list(&paths, a),
        Cmd::View(a) => cmd_view(&paths, a),
        Cmd::Load(a) => cmd_load(&paths, a),
        Cmd::Auto(a) => cmd_auto(&paths, a),
        Cmd::Settings(a) => cmd_settings(&paths, a),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: snb_core::Error) -> ! {
    eprintln!("error: {}", e);
    std::process::exit(if e.is_validation() { 3 } else { 2 });
}

fn open_backups(paths: &Paths) -> Backups {
    Backups::open(paths).unwrap_or_else(|e| fail(e))
}

fn cmd_create(paths: &Paths) {
    let backups = open_backups(paths);
    let created = backups.create_snapshot().unwrap_or_else(|e| fail(e));
    println!("{}", created.snapshot.path.display());
    if let Some(e) = created.counter_error {
        eprintln!("warning: {}", e);
    }
}

fn cmd_list(paths: &Paths, args: OutputArgs) {
    let backups = open_backups(paths);
    let view = backups.build_view().unwrap_or_else(|e| fail(e));
    if args.json {
        let rows: Vec<_> = view
            .snapshots
            .iter()
            .map(|s| json!({"seq": s.seq, "name": s.name, "modified": s.modified_display()}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
        return;
    }
    for s in &view.snapshots {
        println!("{}\t{}", s.name, s.modified_display());
    }
    print_skipped(&view);
}

fn slot_cell(state: SlotState<'_>) -> String {
    match state {
        SlotState::Image(t) => format!("[img {}x{}]", t.width, t.height),
        SlotState::Missing => "[No Img]".into(),
        SlotState::Undecodable(_) => "[Img Err]".into(),
    }
}

fn cmd_view(paths: &Paths, args: OutputArgs) {
    let backups = open_backups(paths);
    let view = backups.build_view().unwrap_or_else(|e| fail(e));
    if args.json {
        let rows: Vec<_> = view
            .snapshots
            .iter()
            .map(|s| {
                let slots: serde_json::Map<String, serde_json::Value> = view
                    .slots
                    .iter()
                    .map(|name| {
                        let v = match s.slot(name) {
                            SlotState::Image(t) => {
                                json!({"state": "image", "width": t.width, "height": t.height, "bytes": s.slots[name].bytes.len()})
                            }
                            SlotState::Missing => json!({"state": "missing"}),
                            SlotState::Undecodable(e) => json!({"state": "undecodable", "error": e}),
                        };
                        (name.clone(), v)
                    })
                    .collect();
                json!({"seq": s.seq, "name": s.name, "modified": s.modified_display(), "slots": slots})
            })
            .collect();
        let skipped: Vec<_> = view
            .skipped
            .iter()
            .map(|s| json!({"seq": s.seq, "path": s.path.display().to_string(), "reason": s.reason}))
            .collect();
        let out = json!({"slots": view.slots, "snapshots": rows, "skipped": skipped});
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        return;
    }
    let mut header = vec!["Save File".to_string(), "Last Modified".to_string()];
    header.extend(view.slots.iter().cloned());
    println!("{}", header.join("\t"));
    for s in &view.snapshots {
        let mut row = vec![s.name.clone(), s.modified_display()];
        row.extend(view.slots.iter().map(|name| slot_cell(s.slot(name))));
        println!("{}", row.join("\t"));
    }
    print_skipped(&view);
}

fn print_skipped(view: &View) {
    for s in &view.skipped {
        eprintln!("skipped {}: {}", s.path.display(), s.reason);
    }
}

fn cmd_load(paths: &Paths, args: LoadArgs) {
    if !args.yes {
        eprintln!(
            "loading snapshot {} will overwrite {}; re-run with --yes to confirm",
            args.seq,
            paths.source_dir.display()
        );
        std::process::exit(3);
    }
    let backups = open_backups(paths);
    let loaded = backups.load_snapshot(args.seq).unwrap_or_else(|e| fail(e));
    println!("Backup {} loaded!", loaded.name());
}

fn cmd_auto(paths: &Paths, args: AutoArgs) {
    let store = SettingsStore::in_dir(&paths.backup_dir);
    let interval = match args.interval {
        Some(s) => Interval::parse(&s).unwrap_or_else(|e| fail(e)),
        None => store.load().interval(),
    };
    let backups = Arc::new(open_backups(paths));
    let mut auto = AutoBackup::new();
    let job_backups = Arc::clone(&backups);
    auto.enable(interval, move || match job_backups.create_snapshot() {
        Ok(c) => println!("{}", c.snapshot.path.display()),
        Err(e) => eprintln!("error: {}", e),
    })
    .unwrap_or_else(|e| fail(e));
    eprintln!("auto-backup every {}; press Enter to stop", interval);
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
    auto.shutdown();
}

fn cmd_settings(paths: &Paths, args: SettingsArgs) {
    let store = SettingsStore::in_dir(&paths.backup_dir);
    let mut settings = store.load();
    let changed = args.enabled.is_some() || args.interval.is_some();
    if let Some(s) = args.interval {
        settings.auto_backup_interval = Interval::parse(&s).unwrap_or_else(|e| fail(e)).minutes();
    }
    if let Some(enabled) = args.enabled {
        settings.auto_backup_enabled = enabled;
    }
    if changed {
        store.save(&settings).unwrap_or_else(|e| fail(e));
    }
    println!("{}", serde_json::to_string_pretty(&settings).unwrap_or_default());
}

//! RosterDB CLI
//!
//! Thin administrative front-end over the store API. Field validation
//! happens here, before anything reaches the store; the store itself only
//! re-checks student-code uniqueness under its lock.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use rosterdb::validate;
use rosterdb::{BackupReason, Config, DeleteConfirmation, Record, RecordDraft, RecordPatch, Store};

/// RosterDB CLI
#[derive(Parser, Debug)]
#[command(name = "rosterdb-cli")]
#[command(about = "Crash-tolerant CSV-backed student record store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./rosterdb_data")]
    data_dir: PathBuf,

    /// Table name
    #[arg(short, long, default_value = "students")]
    table: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a new record
    Add {
        /// Student code (8-10 digits)
        code: String,
        first_name: String,
        last_name: String,
        email: String,
        phone: String,
        /// GPA in [0, 20], at most two decimals
        gpa: f64,
    },

    /// Show a record by ID
    Get { id: u64 },

    /// List all records
    List,

    /// Search code/name/email fields
    Search { term: String },

    /// Update fields of a record (omitted fields keep their value)
    Update {
        id: u64,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        gpa: Option<f64>,
    },

    /// Delete a record permanently
    Delete {
        id: u64,
        /// Required; deletion is irreversible
        #[arg(long)]
        yes: bool,
    },

    /// Take a manual backup snapshot
    Backup,

    /// List backup snapshots, newest first
    Backups,

    /// Restore the table from a snapshot
    Restore { snapshot: PathBuf },

    /// Show the ID the next add would assign
    NextId,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,rosterdb=info"));

    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .table_name(&args.table)
        .build();

    let store = match Store::open(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&store, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(store: &Store, command: Commands) -> Result<(), String> {
    match command {
        Commands::Add {
            code,
            first_name,
            last_name,
            email,
            phone,
            gpa,
        } => {
            let code = validate::sanitize(&code);
            if !validate::is_valid_student_code(&code) {
                return Err(format!("invalid student code: {:?}", code));
            }
            if !validate::is_valid_email(&email) {
                return Err(format!("invalid email: {:?}", email));
            }
            if !validate::is_valid_phone(&phone) {
                return Err(format!("invalid phone: {:?}", phone));
            }
            if !validate::is_valid_gpa(gpa) {
                return Err(format!("invalid GPA: {}", gpa));
            }

            let record = store
                .create(RecordDraft {
                    student_code: code,
                    first_name,
                    last_name,
                    email,
                    phone,
                    gpa,
                })
                .map_err(|e| e.to_string())?;
            println!("created record {}", record.id);
            print_record(&record);
        }

        Commands::Get { id } => {
            let record = store.read(id).map_err(|e| e.to_string())?;
            print_record(&record);
        }

        Commands::List => {
            let records = store.list().map_err(|e| e.to_string())?;
            println!("{} record(s)", records.len());
            for record in records {
                print_record(&record);
            }
        }

        Commands::Search { term } => {
            let records = store.search(&term).map_err(|e| e.to_string())?;
            println!("{} match(es)", records.len());
            for record in records {
                print_record(&record);
            }
        }

        Commands::Update {
            id,
            code,
            first_name,
            last_name,
            email,
            phone,
            gpa,
        } => {
            if let Some(code) = &code {
                if !validate::is_valid_student_code(&validate::sanitize(code)) {
                    return Err(format!("invalid student code: {:?}", code));
                }
            }
            if let Some(gpa) = gpa {
                if !validate::is_valid_gpa(gpa) {
                    return Err(format!("invalid GPA: {}", gpa));
                }
            }

            let record = store
                .update(
                    id,
                    RecordPatch {
                        student_code: code,
                        first_name,
                        last_name,
                        email,
                        phone,
                        gpa,
                    },
                )
                .map_err(|e| e.to_string())?;
            println!("updated record {}", id);
            print_record(&record);
        }

        Commands::Delete { id, yes } => {
            if !yes {
                return Err("deletion is irreversible; pass --yes to confirm".to_string());
            }
            let removed = store
                .delete(id, DeleteConfirmation::confirmed())
                .map_err(|e| e.to_string())?;
            println!("deleted record {} ({})", removed.id, removed.student_code);
        }

        Commands::Backup => {
            let path = store
                .backup(BackupReason::Manual)
                .map_err(|e| e.to_string())?;
            println!("snapshot written to {}", path.display());
        }

        Commands::Backups => {
            let snapshots = store.backups().list_snapshots().map_err(|e| e.to_string())?;
            println!("{} snapshot(s)", snapshots.len());
            for snapshot in snapshots {
                println!("  {}", snapshot.display());
            }
        }

        Commands::Restore { snapshot } => {
            let safety = store.restore(&snapshot).map_err(|e| e.to_string())?;
            println!("restored from {}", snapshot.display());
            println!("safety copy of previous table: {}", safety.display());
        }

        Commands::NextId => {
            let id = store.next_id_preview().map_err(|e| e.to_string())?;
            println!("{}", id);
        }
    }

    Ok(())
}

fn print_record(r: &Record) {
    println!(
        "  [{}] {} {} <{}> code={} phone={} gpa={} registered={}",
        r.id, r.first_name, r.last_name, r.email, r.student_code, r.phone, r.gpa, r.registered_at
    );
}

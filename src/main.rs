// reset; cargo run -- --ldap-server dc01.example.com --ldaps --username "EXAMPLE\admin" --source-file ./data/students.xlsx --destination-ou "Students/CS" --domain example.com --result-file ./data/students-result
// reset; cargo run -- --dry-run --source-file ./data/students.xlsx --destination-ou "CS.Students" --domain example.com --result-file result

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use importer_lib::directory::dn::domain_to_base_dn;
use importer_lib::utils::{get_local_iso_datetime, init_file_logger};
use importer_lib::{
    BatchReport, BatchSettings, ColumnLayout, ContainerPath, Directory, LayoutPreset,
    LdapDirectory, LdapSettings, MemoryDirectory, ProvisionError, Script, Transliterator,
    read_input_rows, run_batch, write_outcomes,
};
use log::{LevelFilter, error, info};
use rpassword::prompt_password;

#[derive(Parser, Debug)]
#[command(name = "ad-importer")]
#[command(about = "Create Active Directory accounts and OUs from an Excel workbook")]
#[command(version)]
struct Args {
    /// LDAP server host (dc01.example.com, dc01:389) or a full ldap:// / ldaps:// URL
    #[arg(long, required_unless_present = "dry_run")]
    ldap_server: Option<String>,

    /// Account used to bind to the directory (DN, UPN or DOMAIN\user)
    #[arg(short, long, required_unless_present = "dry_run")]
    username: Option<String>,

    /// Bind password. If not specified, the password will be required during runtime.
    #[arg(long)]
    password: Option<String>,

    /// Connect with LDAPS instead of plain LDAP
    #[arg(long)]
    ldaps: bool,

    /// Path to the Excel workbook with one account per row
    #[arg(short, long)]
    source_file: PathBuf,

    /// Optional sheet name to read (if not specified, the first sheet is used)
    #[arg(long)]
    sheet_name: Option<String>,

    /// Destination OU below the domain root: "Students/CS" (root first) or "CS.Students" (leaf first)
    #[arg(long, default_value = "")]
    destination_ou: String,

    /// Domain of the accounts; used for the email addresses and the DC= base DN
    #[arg(short, long)]
    domain: String,

    /// UPN suffix for the new accounts (defaults to the domain)
    #[arg(long)]
    upn_suffix: Option<String>,

    /// Where the workbook with the results is saved (.xlsx is added when missing)
    #[arg(short, long)]
    result_file: PathBuf,

    /// Log file, truncated on every run (.txt is added when missing)
    #[arg(long, default_value = "import-log")]
    log_file: PathBuf,

    /// Column layout of the source workbook: legacy or phone
    #[arg(long, default_value = "legacy")]
    layout: LayoutPreset,

    /// JSON file with a custom column layout; overrides --layout
    #[arg(long)]
    layout_file: Option<PathBuf>,

    /// Script of the surname column: ru or uk
    #[arg(long, default_value = "ru")]
    script: Script,

    /// Put accounts into <destination>/<year>/<group> instead of the destination OU itself
    #[arg(long)]
    group_year_containers: bool,

    /// Run against an empty in-memory directory instead of the LDAP server
    #[arg(long)]
    dry_run: bool,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

impl Args {
    fn column_layout(&self) -> Result<ColumnLayout, anyhow::Error> {
        let layout = match &self.layout_file {
            Some(path) => ColumnLayout::from_json_file(path)?,
            None => self.layout.layout(),
        };
        layout.check_duplicates()?;
        Ok(layout)
    }

    fn batch_settings(&self) -> BatchSettings {
        let mut settings =
            BatchSettings::new(&self.domain, ContainerPath::parse(&self.destination_ou));
        if let Some(upn_suffix) = &self.upn_suffix {
            settings.upn_suffix = upn_suffix.trim().to_string();
        }
        settings.group_year_containers = self.group_year_containers;
        settings.transliterator = Transliterator::to_latin(self.script);
        settings
    }

    fn open_directory(&self, base_dn: &str) -> Result<Box<dyn Directory>, anyhow::Error> {
        if self.dry_run {
            info!("Dry run: using an empty in-memory directory rooted at {base_dn}");
            return Ok(Box::new(MemoryDirectory::new(base_dn)));
        }

        let server = self.ldap_server.clone().unwrap_or_default();
        let password = match &self.password {
            Some(password) => password.clone(),
            None => prompt_password("Password: ")?,
        };
        let settings = LdapSettings {
            server,
            bind_user: self.username.clone().unwrap_or_default(),
            password,
            use_tls: self.ldaps,
            base_dn: base_dn.to_string(),
        };

        let directory = LdapDirectory::connect(&settings)?;
        info!("LDAP server set to {}", settings.server);
        Ok(Box::new(directory))
    }
}

struct ImportSummary {
    report: BatchReport,
    result_file: PathBuf,
}

fn run(args: &Args, log_path: &Path) -> Result<ImportSummary, anyhow::Error> {
    let layout = args.column_layout()?;

    info!("Import started at {}", get_local_iso_datetime());
    info!("Data import from {} started", args.source_file.display());

    let (workbook, rows) =
        read_input_rows(&args.source_file, args.sheet_name.as_deref(), &layout)?;
    info!(
        "{} row(s) read from sheet '{}'",
        rows.len(),
        workbook.source_sheet().name
    );

    // Nothing to place the accounts under: stop before touching the directory.
    if rows.iter().all(|row| row.group_year.trim().is_empty()) {
        return Err(ProvisionError::NoGroupYearDetermined.into());
    }

    let settings = args.batch_settings();
    let base_dn = domain_to_base_dn(&settings.domain);
    let mut directory = args.open_directory(&base_dn)?;

    let report = run_batch(directory.as_mut(), &rows, &settings)?;
    let result_file = write_outcomes(
        &workbook,
        &args.result_file,
        &layout,
        &report.records,
        &report.outcomes,
    )?;
    info!("Log written to {}", log_path.display());

    Ok(ImportSummary {
        report,
        result_file,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_path = match init_file_logger(&args.log_file, args.log_level) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("❌ Unable to set up logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &log_path) {
        Ok(summary) => {
            let report = &summary.report;
            println!(
                "✅ Import completed: {} of {} account(s) succeeded",
                report.succeeded(),
                report.outcomes.len()
            );
            if report.failed() > 0 {
                println!(
                    "❌ {} row(s) failed. Check {} for details.",
                    report.failed(),
                    log_path.display()
                );
            }
            println!("✅ Results saved to {}", summary.result_file.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Import aborted: {e:#}");
            eprintln!("❌ Import failed with error: {e:#}");
            eprintln!("❌ Check {} for details.", log_path.display());
            ExitCode::FAILURE
        }
    }
}

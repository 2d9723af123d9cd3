// gridbook CLI - headless operations on saved spreadsheet documents

mod exit_codes;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use gridbook_config::Settings;
use gridbook_engine::cell::Grid;
use gridbook_engine::command::{Command as DocCommand, Outcome};
use gridbook_engine::coord::CellRange;
use gridbook_engine::document::{Document, ImportedSheet};
use gridbook_engine::search::{find_all, SearchQuery};
use gridbook_engine::stats::SelectionStats;
use gridbook_engine::store::{Store, StoreOptions};
use gridbook_io::csv::CsvOptions;
use gridbook_io::kv::SqliteStore;
use gridbook_io::library::{FileEntry, Library};
use gridbook_io::persist::{open_into, save_store};
use gridbook_io::StorageError;

use exit_codes::{EXIT_ERROR, EXIT_NOT_FOUND, EXIT_REJECTED, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "gridbook")]
#[command(about = "Manage saved spreadsheet documents from the shell")]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/gridbook/settings.json)
    #[arg(long, global = true, env = "GRIDBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Document database (overrides storage.path)
    #[arg(long, global = true, env = "GRIDBOOK_STORE")]
    store: Option<PathBuf>,

    /// More logging (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved documents, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Create and save an empty three-sheet document
    New {
        filename: String,
    },

    /// Print one sheet of a saved document as CSV
    #[command(after_help = "\
Examples:
  gridbook show Budget
  gridbook show Budget --sheet Totals
  gridbook show Budget --range B2:B10")]
    Show {
        /// Filename or storage key
        document: String,

        /// Sheet to print (default: the active sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Print sum/average/count of this range instead of the cells
        #[arg(long)]
        range: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List cells whose text matches
    Find {
        document: String,
        text: String,

        #[arg(long)]
        sheet: Option<String>,

        #[arg(long)]
        case_sensitive: bool,

        #[arg(long)]
        whole_cell: bool,

        /// Treat TEXT as a regular expression
        #[arg(long)]
        regex: bool,
    },

    /// Import CSV/TSV or an Excel workbook as new sheets
    #[command(after_help = "\
Examples:
  gridbook import sales.csv                 # new document named 'sales'
  gridbook import q1.xlsx --into Budget     # add every worksheet to Budget
  gridbook import export.txt --delimiter ';'
  gridbook import meibo.csv --encoding Shift_JIS --header")]
    Import {
        file: PathBuf,

        /// Add the sheets to this saved document instead of a new one
        #[arg(long)]
        into: Option<String>,

        /// CSV delimiter (default: detect)
        #[arg(long)]
        delimiter: Option<char>,

        /// CSV text encoding, e.g. Shift_JIS, EUC-JP, CP932, ISO-8859-1 (default: UTF-8)
        #[arg(long)]
        encoding: Option<String>,

        /// Treat the first CSV row as column names
        #[arg(long)]
        header: bool,
    },

    /// Export a saved document
    Export {
        document: String,

        #[arg(long, short = 't')]
        to: Format,

        /// Output file (omit for stdout; required for xlsx)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Sheet for csv/tsv/json (default: the active sheet)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Run a JSON array of document commands, then save
    #[command(after_help = "\
Script format:
  [
    {\"command\": \"addSheet\", \"name\": \"Totals\"},
    {\"command\": \"pushUndo\"},
    {\"command\": \"updateSheetData\", \"sheet\": \"Totals\", \"data\": [[1, 2], [3, null]]},
    {\"command\": \"undo\"}
  ]")]
    Apply {
        document: String,

        /// Script file, or - for stdin
        script: PathBuf,

        /// Run the commands but do not save
        #[arg(long)]
        dry_run: bool,

        /// Fail (exit 4, nothing saved) if any command is not applied
        #[arg(long)]
        strict: bool,
    },

    /// Delete a saved document
    Delete {
        document: String,
    },

    /// Save the autosaved working copy into the library
    Recover,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Tsv,
    Json,
    Xlsx,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn not_found(name: &str) -> Self {
        Self {
            code: EXIT_NOT_FOUND,
            message: format!("no saved document named '{}'", name),
            hint: Some("run `gridbook list` to see saved documents".to_string()),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound(key) => CliError::not_found(key),
            StorageError::QuotaExceeded { .. } => CliError::general(err.to_string())
                .with_hint("raise storage.quotaBytes in settings.json, or set it to null"),
            _ => CliError::general(err.to_string()),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::general(err.to_string())
    }
}

type CliResult = Result<(), CliError>;

// ============================================================================
// Entry
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let result = Context::open(settings, cli.store).and_then(|mut ctx| match cli.command {
        Commands::List { json } => ctx.cmd_list(json),
        Commands::New { filename } => ctx.cmd_new(filename),
        Commands::Show { document, sheet, range, json } => ctx.cmd_show(&document, sheet, range, json),
        Commands::Find { document, text, sheet, case_sensitive, whole_cell, regex } => {
            let query = SearchQuery { text, case_sensitive, whole_cell, regex, ..Default::default() };
            ctx.cmd_find(&document, sheet, query)
        }
        Commands::Import { file, into, delimiter, encoding, header } => {
            ctx.cmd_import(&file, into, delimiter, encoding, header)
        }
        Commands::Export { document, to, output, sheet } => ctx.cmd_export(&document, to, output, sheet),
        Commands::Apply { document, script, dry_run, strict } => ctx.cmd_apply(&document, &script, dry_run, strict),
        Commands::Delete { document } => ctx.cmd_delete(&document),
        Commands::Recover => ctx.cmd_recover(),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

struct Context {
    settings: Settings,
    library: Library<SqliteStore>,
}

impl Context {
    fn open(settings: Settings, store_override: Option<PathBuf>) -> Result<Self, CliError> {
        let path = store_override.unwrap_or_else(|| settings.storage_file());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        log::debug!("using document store {}", path.display());
        let kv = SqliteStore::open(&path)?.with_quota(settings.quota_bytes);
        Ok(Self { settings, library: Library::new(kv) })
    }

    fn store_options(&self) -> StoreOptions {
        StoreOptions {
            history_capacity: self.settings.history_capacity,
            default_filename: self.settings.default_filename.clone(),
        }
    }

    /// Match a storage key first, then the newest save of a filename.
    fn resolve(&self, name: &str) -> Result<FileEntry, CliError> {
        let entries = self.library.list()?;
        entries
            .iter()
            .find(|e| e.key == name)
            .or_else(|| entries.iter().find(|e| e.filename == name))
            .cloned()
            .ok_or_else(|| CliError::not_found(name))
    }

    fn load(&self, name: &str) -> Result<Store, CliError> {
        let entry = self.resolve(name)?;
        let mut store = Store::new(self.store_options());
        open_into(&self.library, &mut store, &entry.key)?;
        Ok(store)
    }

    fn save(&mut self, store: &mut Store) -> Result<FileEntry, CliError> {
        Ok(save_store(&mut self.library, store, Utc::now())?)
    }

    // ------------------------------------------------------------------------

    fn cmd_list(&self, json: bool) -> CliResult {
        let entries = self.library.list()?;
        if json {
            let text = serde_json::to_string_pretty(&entries).map_err(|e| CliError::general(e.to_string()))?;
            println!("{}", text);
            return Ok(());
        }
        for entry in &entries {
            println!("{}  {}  ({})", entry.saved_at.format("%Y-%m-%d %H:%M:%S"), entry.filename, entry.key);
        }
        Ok(())
    }

    fn cmd_new(&mut self, filename: String) -> CliResult {
        if self.library.find(&filename)?.is_some() {
            return Err(CliError::args(format!("'{}' already exists", filename))
                .with_hint("use `gridbook apply` to change it or `gridbook delete` first"));
        }
        let mut store = Store::new(self.store_options());
        store.dispatch(DocCommand::SetFilename { filename });
        let entry = self.save(&mut store)?;
        println!("{}", entry.key);
        Ok(())
    }

    fn cmd_show(&self, name: &str, sheet: Option<String>, range: Option<String>, json: bool) -> CliResult {
        let store = self.load(name)?;
        let doc = store.document();
        let grid = sheet_grid(doc, sheet.as_deref())?;

        if let Some(range) = range {
            let range = CellRange::parse_a1(&range)
                .ok_or_else(|| CliError::args(format!("invalid range '{}'", range)))?;
            let stats = SelectionStats::compute(grid, range);
            if json {
                let text = serde_json::to_string_pretty(&stats).map_err(|e| CliError::general(e.to_string()))?;
                println!("{}", text);
            } else {
                println!("{}", stats.summary());
            }
            return Ok(());
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        if json {
            gridbook_io::json::write_grid(grid, &mut out)?;
            writeln!(out)?;
        } else {
            let tabs: Vec<String> = doc
                .sheets()
                .iter()
                .map(|s| if s == doc.active_sheet() { format!("[{}]", s) } else { s.to_string() })
                .collect();
            eprintln!("{}: {}", doc.filename(), tabs.join(" "));
            gridbook_io::csv::write_grid(grid, &mut out, b',')?;
        }
        Ok(())
    }

    fn cmd_find(&self, name: &str, sheet: Option<String>, query: SearchQuery) -> CliResult {
        if query.compile().is_none() {
            return Err(CliError::args(format!("invalid search pattern '{}'", query.text)));
        }
        let store = self.load(name)?;
        let grid = sheet_grid(store.document(), sheet.as_deref())?;
        for coord in find_all(grid, &query) {
            println!("{}\t{}", coord.to_a1(), grid.get(coord).display());
        }
        Ok(())
    }

    fn cmd_import(
        &mut self,
        file: &Path,
        into: Option<String>,
        delimiter: Option<char>,
        encoding: Option<String>,
        header: bool,
    ) -> CliResult {
        let delimiter = match delimiter {
            Some(c) if c.is_ascii() => Some(c as u8),
            Some(c) => return Err(CliError::args(format!("delimiter must be ASCII, got '{}'", c))),
            None => self.settings.delimiter_byte(),
        };
        let encoding = match encoding.or_else(|| self.settings.import_encoding.clone()) {
            Some(label) => Some(gridbook_io::csv::encoding_for_label(&label).ok_or_else(|| {
                CliError::args(format!("unknown encoding '{}'", label))
                    .with_hint("try UTF-8, Shift_JIS, CP932, EUC-JP or ISO-8859-1")
            })?),
            None => None,
        };
        let options = CsvOptions {
            delimiter,
            encoding,
            has_header: header || self.settings.import_has_header,
        };
        let sheets = read_import(file, &options)?;

        let mut store = match &into {
            Some(name) => self.load(name)?,
            None => {
                let mut store = Store::new(self.store_options());
                let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
                if !stem.is_empty() {
                    store.dispatch(DocCommand::SetFilename { filename: stem });
                }
                store
            }
        };

        let count = sheets.len();
        let outcome = store.dispatch(DocCommand::ImportSheets { sheets });
        if let Outcome::Unchanged(notice) = outcome {
            return Err(CliError::general(format!("{}: {}", file.display(), notice)));
        }
        let entry = self.save(&mut store)?;
        println!("imported {} sheet(s) into '{}' ({})", count, entry.filename, entry.key);
        Ok(())
    }

    fn cmd_export(&self, name: &str, to: Format, output: Option<PathBuf>, sheet: Option<String>) -> CliResult {
        let store = self.load(name)?;
        let doc = store.document();

        if to == Format::Xlsx {
            let path = output.ok_or_else(|| CliError::args("xlsx export needs --output"))?;
            gridbook_io::xlsx::export(doc, &path)?;
            return Ok(());
        }

        let grid = sheet_grid(doc, sheet.as_deref())?;
        match (to, output) {
            (Format::Json, Some(path)) => gridbook_io::json::export(grid, &path)?,
            (Format::Json, None) => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                gridbook_io::json::write_grid(grid, &mut out)?;
                writeln!(out)?;
            }
            (format, Some(path)) => gridbook_io::csv::export(grid, &path, delimiter_for(format))?,
            (format, None) => gridbook_io::csv::write_grid(grid, io::stdout().lock(), delimiter_for(format))?,
        }
        Ok(())
    }

    fn cmd_apply(&mut self, name: &str, script: &Path, dry_run: bool, strict: bool) -> CliResult {
        let text = if script.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            fs::read_to_string(script)
                .map_err(|e| CliError::args(format!("cannot read {}: {}", script.display(), e)))?
        };
        let commands: Vec<DocCommand> = serde_json::from_str(&text)
            .map_err(|e| CliError::args(format!("invalid script: {}", e)))?;

        let mut store = self.load(name)?;
        let mut applied = 0usize;
        let mut rejected = 0usize;
        for command in commands {
            let label = command.name();
            match store.dispatch(command) {
                Outcome::Applied => {
                    applied += 1;
                    println!("applied  {}", label);
                }
                Outcome::Unchanged(notice) => {
                    rejected += 1;
                    println!("skipped  {}: {}", label, notice);
                }
            }
        }

        if strict && rejected > 0 {
            return Err(CliError {
                code: EXIT_REJECTED,
                message: format!("{} command(s) not applied; nothing saved", rejected),
                hint: None,
            });
        }
        if dry_run || applied == 0 {
            return Ok(());
        }
        let entry = self.save(&mut store)?;
        log::info!("saved {} change(s) as {}", applied, entry.key);
        Ok(())
    }

    fn cmd_delete(&mut self, name: &str) -> CliResult {
        let entry = self.resolve(name)?;
        self.library.remove(&entry.key)?;
        println!("deleted '{}'", entry.filename);
        Ok(())
    }

    fn cmd_recover(&mut self) -> CliResult {
        let Some(doc) = self.library.restore()? else {
            println!("no autosaved working copy");
            return Ok(());
        };
        let mut store = Store::from_document(doc, self.store_options());
        let entry = self.save(&mut store)?;
        self.library.clear_autosave()?;
        println!("recovered '{}' ({})", entry.filename, entry.key);
        Ok(())
    }
}

fn sheet_grid<'a>(doc: &'a Document, sheet: Option<&str>) -> Result<&'a Grid, CliError> {
    let name = sheet.unwrap_or(doc.active_sheet().as_str());
    doc.grid(name).ok_or_else(|| {
        let names: Vec<&str> = doc.sheets().iter().map(|s| s.as_str()).collect();
        CliError::args(format!("no sheet named '{}'", name)).with_hint(format!("sheets: {}", names.join(", ")))
    })
}

fn read_import(file: &Path, options: &CsvOptions) -> Result<Vec<ImportedSheet>, CliError> {
    let ext = file
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let sheets = match ext.as_str() {
        "csv" | "txt" => vec![gridbook_io::csv::import(file, options)?],
        "tsv" | "tab" => {
            let options = CsvOptions { delimiter: options.delimiter.or(Some(b'\t')), ..*options };
            vec![gridbook_io::csv::import(file, &options)?]
        }
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => gridbook_io::xlsx::import(file)?,
        _ => {
            return Err(CliError::args(format!("cannot import '{}'", file.display()))
                .with_hint("supported: csv, tsv, txt, xlsx, xlsm, xls, xlsb, ods"))
        }
    };
    Ok(sheets)
}

fn delimiter_for(format: Format) -> u8 {
    match format {
        Format::Tsv => b'\t',
        _ => b',',
    }
}

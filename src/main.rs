//! Purpose: `stockroom` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Command results are JSON on stdout; records keep their wire (camelCase) shape.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`; rejections map to a kind too.
//! Invariants: Mutations are stamped with the session actor, or the fallback actor when logged out.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod serve;

use stockroom::api::{
    ClientConfig, DEFAULT_API_URL, Error, ErrorKind, InventoryService, LocalStore, Location,
    NewProduct, NewStock, Outcome, Product, ProductPatch, RejectReason, RemoteClient, SortKey,
    default_state_dir, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    if !matches!(cli.command, Command::Serve(_)) {
        init_tracing("warn");
    }

    let context = CliContext {
        api_url: cli.api_url,
        state_dir: cli.state_dir.unwrap_or_else(default_state_dir),
        timeout: Duration::from_millis(cli.timeout_ms),
        tls_ca: cli.tls_ca,
    };

    command_dispatch::dispatch_command(cli.command, &context)
        .map_err(add_network_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "stockroom",
    version,
    about = "Warehouse inventory client",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Talks to an inventory REST store. Output is JSON.

Mental model:
  - `login` remembers who you are on this machine
  - `stock add|remove` adjusts one location's quantity
  - `stats` summarizes the whole catalog
"#,
    after_help = r#"EXAMPLES
  $ stockroom serve --db inventory.json      # Terminal 1: local store
  $ stockroom login SK-1234                  # Terminal 2
  $ stockroom product scan 6111245591001
  $ stockroom stock remove 3 1 5

LEARN MORE
  $ stockroom <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_API_URL",
        default_value = DEFAULT_API_URL,
        help = "Base URL of the inventory store"
    )]
    api_url: String,
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_STATE_DIR",
        help = "Directory for the local session and deletion ledger (default: ~/.stockroom)",
        value_hint = ValueHint::DirPath
    )]
    state_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = 10_000,
        help = "Request timeout in milliseconds"
    )]
    timeout_ms: u64,
    #[arg(
        long,
        global = true,
        help = "Trust only the certificates in this PEM file for https stores",
        value_hint = ValueHint::FilePath
    )]
    tls_ca: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SortCli {
    Name,
    Price,
    Quantity,
}

impl From<SortCli> for SortKey {
    fn from(value: SortCli) -> Self {
        match value {
            SortCli::Name => SortKey::Name,
            SortCli::Price => SortKey::Price,
            SortCli::Quantity => SortKey::Quantity,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Log in with a warehouseman secret code",
        after_help = r#"EXAMPLES
  $ stockroom login SK-1234

NOTES
  - The identity is stored under --state-dir; the secret code is not."#
    )]
    Login {
        #[arg(help = "Secret code")]
        secret: String,
    },
    #[command(about = "Forget the logged-in warehouseman")]
    Logout,
    #[command(about = "Show the logged-in warehouseman")]
    Whoami,
    #[command(arg_required_else_help = true, about = "Browse and manage products")]
    Product {
        #[command(subcommand)]
        command: ProductCommand,
    },
    #[command(
        arg_required_else_help = true,
        about = "Adjust the quantity held at one stock location",
        after_help = r#"EXAMPLES
  $ stockroom stock add 3 1 20
  $ stockroom stock remove 3 1 5

NOTES
  - Removing more than is held is refused and nothing is written."#
    )]
    Stock {
        #[command(subcommand)]
        command: StockCommand,
    },
    #[command(about = "Catalog statistics")]
    Stats,
    #[command(
        arg_required_else_help = true,
        about = "Render a product summary as HTML",
        after_help = r#"EXAMPLES
  $ stockroom export 3 --out crate.html
  $ stockroom export 3 > crate.html"#
    )]
    Export {
        #[arg(help = "Product id")]
        id: u64,
        #[arg(long, help = "Write to this file instead of stdout", value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    #[command(about = "Show how often products were deleted from this machine")]
    Deletions,
    #[command(about = "Run a local development store")]
    Serve(ServeArgs),
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ stockroom completion bash > ~/.local/share/bash-completion/completions/stockroom
  $ stockroom completion zsh > ~/.zfunc/_stockroom"#
    )]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ProductCommand {
    #[command(about = "List products")]
    List {
        #[arg(long, help = "Case-insensitive match on name, type, supplier or price")]
        search: Option<String>,
        #[arg(long, value_enum, default_value = "name")]
        sort: SortCli,
    },
    #[command(arg_required_else_help = true, about = "Show one product by id")]
    Show {
        #[arg(help = "Product id")]
        id: u64,
    },
    #[command(arg_required_else_help = true, about = "Look a product up by barcode")]
    Scan {
        #[arg(help = "Barcode")]
        barcode: String,
    },
    #[command(
        about = "Create a product",
        after_help = r#"EXAMPLES
  $ stockroom product add --name Crate --type Packaging --barcode 123 --price 2.5 \
      --supplier Acme --stock-name "Main hall" --city Rabat --quantity 40"#
    )]
    Add(AddArgs),
    #[command(
        arg_required_else_help = true,
        about = "Edit product fields or stock quantities",
        after_help = r#"EXAMPLES
  $ stockroom product edit 3 --price 3.75
  $ stockroom product edit 3 --set-quantity 1=40 --set-quantity 2=0"#
    )]
    Edit(EditArgs),
    #[command(arg_required_else_help = true, about = "Delete a product")]
    Delete {
        #[arg(help = "Product id")]
        id: u64,
    },
}

#[derive(Subcommand)]
enum StockCommand {
    #[command(arg_required_else_help = true, about = "Add units to a stock location")]
    Add(StockArgs),
    #[command(arg_required_else_help = true, about = "Remove units from a stock location")]
    Remove(StockArgs),
}

#[derive(Args)]
struct StockArgs {
    #[arg(help = "Product id")]
    product: u64,
    #[arg(help = "Stock id within the product")]
    stock: u64,
    #[arg(help = "Units to add or remove")]
    quantity: u64,
}

#[derive(Args)]
struct AddArgs {
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long = "type", default_value = "")]
    kind: String,
    #[arg(long, default_value = "")]
    barcode: String,
    #[arg(long, default_value_t = 0.0)]
    price: f64,
    #[arg(long, default_value = "")]
    supplier: String,
    #[arg(long, default_value = "")]
    image: String,
    #[arg(long, help = "Initial stock location name (defaults to the city)")]
    stock_name: Option<String>,
    #[arg(long, help = "City of the initial stock location")]
    city: String,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    latitude: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    longitude: f64,
    #[arg(long, default_value_t = 0, help = "Initial quantity at the stock location")]
    quantity: u64,
}

impl AddArgs {
    fn into_new_product(self) -> NewProduct {
        let stock = NewStock {
            id: None,
            name: self.stock_name.unwrap_or_else(|| self.city.clone()),
            quantity: self.quantity,
            localisation: Location {
                city: self.city,
                latitude: self.latitude,
                longitude: self.longitude,
            },
        };
        NewProduct {
            name: self.name,
            kind: self.kind,
            barcode: self.barcode,
            price: self.price,
            supplier: self.supplier,
            image: self.image,
            stocks: vec![stock],
        }
    }
}

#[derive(Args)]
struct EditArgs {
    #[arg(help = "Product id")]
    id: u64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    supplier: Option<String>,
    #[arg(long)]
    image: Option<String>,
    #[arg(
        long = "set-quantity",
        value_name = "STOCK=QTY",
        value_parser = parse_quantity_override,
        help = "Overwrite one stock location's quantity (repeatable)"
    )]
    quantities: Vec<(u64, u64)>,
}

impl EditArgs {
    fn into_patch(self) -> (u64, ProductPatch) {
        let patch = ProductPatch {
            name: self.name,
            kind: self.kind,
            price: self.price,
            supplier: self.supplier,
            image: self.image,
            quantities: self.quantities,
        };
        (self.id, patch)
    }
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:3000", help = "Address to listen on")]
    bind: SocketAddr,
    #[arg(
        long,
        help = "JSON database file to load and save ({products, warehousemans})",
        value_hint = ValueHint::FilePath
    )]
    db: Option<PathBuf>,
    #[arg(long, help = "Allow binding a non-loopback address")]
    allow_non_loopback: bool,
}

struct CliContext {
    api_url: String,
    state_dir: PathBuf,
    timeout: Duration,
    tls_ca: Option<PathBuf>,
}

impl CliContext {
    fn service(&self) -> Result<InventoryService<RemoteClient>, Error> {
        let mut client = RemoteClient::with_config(ClientConfig {
            base_url: self.api_url.clone(),
            timeout: self.timeout,
        })?;
        if let Some(path) = &self.tls_ca {
            client = client.with_tls_ca_file(path)?;
        }
        Ok(InventoryService::new(client))
    }

    fn local(&self) -> LocalStore {
        LocalStore::new(&self.state_dir)
    }
}

fn parse_quantity_override(input: &str) -> Result<(u64, u64), String> {
    let (stock, quantity) = input
        .split_once('=')
        .ok_or_else(|| "expected STOCK=QTY".to_string())?;
    let stock = stock
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid stock id: {stock}"))?;
    let quantity = quantity
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid quantity: {quantity}"))?;
    Ok((stock, quantity))
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn rejection_kind(reason: RejectReason) -> ErrorKind {
    match reason {
        RejectReason::StockNotFound => ErrorKind::NotFound,
        RejectReason::InsufficientQuantity => ErrorKind::InsufficientQuantity,
        RejectReason::Conflict => ErrorKind::Conflict,
    }
}

/// Emits an outcome envelope and returns the exit code it implies.
fn emit_outcome(outcome: &Outcome<Product>) -> RunOutcome {
    match outcome {
        Outcome::Applied {
            value,
            status,
            message,
        } => {
            emit_json(json!({
                "outcome": {
                    "status": status,
                    "message": message,
                    "product": value,
                }
            }));
            RunOutcome::ok()
        }
        Outcome::Rejected(rejection) => {
            emit_json(json!({
                "outcome": {
                    "status": rejection.status(),
                    "message": rejection.message,
                    "rejected": rejection.reason,
                }
            }));
            RunOutcome::with_code(to_exit_code(rejection_kind(rejection.reason)))
        }
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn add_network_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Network || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check --api-url (or STOCKROOM_API_URL) and that the store is running.")
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Validation => "invalid input".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Conflict => "conflict".to_string(),
        ErrorKind::InsufficientQuantity => "insufficient quantity".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Network => "network error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(product_id) = err.product_id() {
        inner.insert("product_id".to_string(), json!(product_id));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(product_id) = err.product_id() {
        lines.push(format!(
            "{} {product_id}",
            colorize_label("product:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `stockroom --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "stockroom") else {
        return "Try `stockroom --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `stockroom --help`.".to_string();
    }
    format!("Try `stockroom {} --help`.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{
        AddArgs, Cli, Command, Error, ErrorKind, ProductCommand, RejectReason, add_network_hint,
        error_json, error_text, parse_quantity_override, rejection_kind,
    };
    use clap::Parser;

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Usage).with_message("bad input");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.contains("error:"));
        assert!(!plain.contains("\u{1b}["));
    }

    #[test]
    fn error_json_carries_product_and_status() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("product not found")
            .with_product_id(9)
            .with_status(404);
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["product_id"], 9);
        assert_eq!(value["error"]["status"], 404);
    }

    #[test]
    fn quantity_override_parses_pairs() {
        assert_eq!(parse_quantity_override("2=40"), Ok((2, 40)));
        assert!(parse_quantity_override("2").is_err());
        assert!(parse_quantity_override("2=-1").is_err());
    }

    #[test]
    fn rejections_map_to_distinct_kinds() {
        assert_eq!(rejection_kind(RejectReason::StockNotFound), ErrorKind::NotFound);
        assert_eq!(
            rejection_kind(RejectReason::InsufficientQuantity),
            ErrorKind::InsufficientQuantity
        );
        assert_eq!(rejection_kind(RejectReason::Conflict), ErrorKind::Conflict);
    }

    #[test]
    fn network_errors_get_a_hint_once() {
        let err = add_network_hint(Error::new(ErrorKind::Network));
        assert!(err.hint().unwrap_or_default().contains("--api-url"));
        let other = add_network_hint(Error::new(ErrorKind::Usage));
        assert!(other.hint().is_none());
    }

    #[test]
    fn add_args_build_one_initial_stock() {
        let cli = Cli::try_parse_from([
            "stockroom",
            "product",
            "add",
            "--name",
            "Crate",
            "--barcode",
            "123",
            "--city",
            "Rabat",
            "--quantity",
            "4",
        ])
        .expect("parse");
        let Command::Product {
            command: ProductCommand::Add(args),
        } = cli.command
        else {
            panic!("expected product add");
        };
        let new = AddArgs::into_new_product(args);
        assert_eq!(new.stocks.len(), 1);
        assert_eq!(new.stocks[0].name, "Rabat");
        assert_eq!(new.stocks[0].quantity, 4);
    }

    #[test]
    fn add_args_require_city() {
        let err = Cli::try_parse_from([
            "stockroom", "product", "add", "--name", "Crate", "--barcode", "123",
        ])
        .err()
        .expect("missing --city");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}

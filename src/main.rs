use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use sempctl::config::{Config, ConnectionOverrides};
use sempctl::object::{
    self, DesiredState, ListOptions, ListPresence, ListQuery, ListReconcileOptions, PathParams,
    Presence, ReconcileOptions,
};
use sempctl::semp::{about, ApiSurface, Backend, SempClient};
use sempctl::task::TaskResult;
use sempctl::VERSION;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative state management for message broker objects
#[derive(Parser, Debug)]
#[command(name = "sempctl", version = VERSION, about, long_about = None)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Persist the non-secret connection flags as the new defaults
    #[arg(long, global = true)]
    save_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct ConnectionArgs {
    /// Broker host
    #[arg(long, env = "SEMPCTL_HOST", global = true)]
    host: Option<String>,

    /// SEMP port
    #[arg(long, env = "SEMPCTL_PORT", global = true)]
    port: Option<u16>,

    /// Use https
    #[arg(long, global = true)]
    secure: bool,

    /// SEMP username
    #[arg(short, long, env = "SEMPCTL_USERNAME", global = true)]
    username: Option<String>,

    /// SEMP password
    #[arg(long, env = "SEMPCTL_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Cloud API token (cloud backend)
    #[arg(long, env = "SEMPCTL_API_TOKEN", hide_env_values = true, global = true)]
    api_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Sent as the x-broker-name header
    #[arg(long, env = "SEMPCTL_BROKER_NAME", global = true)]
    broker_name: Option<String>,

    /// Which administrative API to talk to
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Replace the default API path prefix
    #[arg(long, global = true)]
    base_path: Option<String>,

    /// Give up listing after this many pages
    #[arg(long, global = true)]
    max_pages: Option<usize>,
}

impl ConnectionArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.host.clone(),
            port: self.port,
            secure: self.secure.then_some(true),
            username: self.username.clone(),
            password: self.password.clone(),
            api_token: self.api_token.clone(),
            timeout_secs: self.timeout,
            broker_name: self.broker_name.clone(),
            backend: self.backend.map(Backend::from),
            base_path: self.base_path.clone(),
        }
    }

    /// Fold the non-secret flags into `config`
    fn apply_to(&self, config: &mut Config) {
        if self.host.is_some() {
            config.host = self.host.clone();
        }
        if self.port.is_some() {
            config.port = self.port;
        }
        if self.secure {
            config.secure = Some(true);
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if self.broker_name.is_some() {
            config.broker_name = self.broker_name.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = Some(backend.into());
        }
        if self.base_path.is_some() {
            config.base_path = self.base_path.clone();
        }
        if self.max_pages.is_some() {
            config.max_pages = self.max_pages;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile one object towards the declared state
    Apply {
        /// Object kind (see `sempctl kinds`)
        kind: String,

        /// Value of the object's lookup key
        #[arg(long)]
        name: String,

        /// Path parameter, e.g. --param msg_vpn=default
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// YAML or JSON file with the desired settings
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Single setting (YAML scalar), applied over --settings
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,

        #[arg(long, value_enum, default_value = "present")]
        state: StateArg,

        /// Report what would change without changing it
        #[arg(long)]
        check: bool,
    },

    /// Reconcile the members of one collection towards a list of names
    ApplyList {
        /// Object kind (see `sempctl kinds`)
        kind: String,

        /// Member lookup key value (repeatable)
        #[arg(long = "name", value_name = "NAME")]
        names: Vec<String>,

        /// Path parameter of the collection, e.g. --param queue=q1
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        #[arg(long, value_enum, default_value = "present")]
        state: ListStateArg,

        /// Report what would change without changing it
        #[arg(long)]
        check: bool,
    },

    /// Fetch one object
    Get {
        kind: String,

        #[arg(long)]
        name: String,

        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        #[arg(long, value_enum, default_value = "config")]
        api: ApiArg,
    },

    /// List every object of a collection
    List {
        kind: String,

        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        #[arg(long, value_enum, default_value = "config")]
        api: ApiArg,

        /// Broker-side filter, e.g. --where 'queueName==q*' (repeatable, ANDed)
        #[arg(long = "where")]
        where_clauses: Vec<String>,

        /// Attributes to return (repeatable)
        #[arg(long)]
        select: Vec<String>,

        /// Page size
        #[arg(long)]
        count: Option<u32>,
    },

    /// Show the known object kinds
    Kinds,

    /// Show the broker's SEMP version
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StateArg {
    Present,
    Absent,
}

impl From<StateArg> for Presence {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Present => Presence::Present,
            StateArg::Absent => Presence::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListStateArg {
    Present,
    Absent,
    PresentOnly,
}

impl From<ListStateArg> for ListPresence {
    fn from(state: ListStateArg) -> Self {
        match state {
            ListStateArg::Present => ListPresence::Present,
            ListStateArg::Absent => ListPresence::Absent,
            ListStateArg::PresentOnly => ListPresence::PresentOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ApiArg {
    Config,
    Monitor,
}

impl From<ApiArg> for ApiSurface {
    fn from(api: ApiArg) -> Self {
        match api {
            ApiArg::Config => ApiSurface::Config,
            ApiArg::Monitor => ApiSurface::Monitor,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Broker,
    Cloud,
}

impl From<BackendArg> for Backend {
    fn from(backend: BackendArg) -> Self {
        match backend {
            BackendArg::Broker => Backend::Broker,
            BackendArg::Cloud => Backend::Cloud,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("sempctl {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("sempctl").join("sempctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".sempctl").join("sempctl.log");
    }
    PathBuf::from("sempctl.log")
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn path_params(pairs: &[(String, String)]) -> PathParams {
    pairs.iter().cloned().collect()
}

/// Read a YAML (or JSON) mapping of settings
fn read_settings_file(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {:?}", path))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse settings file {:?}", path))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => bail!("settings file {:?} must contain a mapping", path),
    }
}

/// `--set` values are YAML scalars: `100` is a number, `true` a boolean
fn parse_setting_value(raw: &str) -> Value {
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn desired_settings(file: Option<&Path>, set: &[(String, String)]) -> Result<Map<String, Value>> {
    let mut settings = match file {
        Some(path) => read_settings_file(path)?,
        None => Map::new(),
    };
    for (key, raw) in set {
        settings.insert(key.clone(), parse_setting_value(raw));
    }
    Ok(settings)
}

fn connect(args: &Args, config: &Config) -> Result<SempClient> {
    let client = SempClient::new(&config.connection(&args.connection.overrides())?)?;
    let connection = client.connection();
    tracing::info!("Using {} at {}", connection.backend, connection.base_url());
    Ok(client)
}

fn max_pages(args: &Args, config: &Config) -> usize {
    args.connection
        .max_pages
        .filter(|n| *n > 0)
        .unwrap_or_else(|| config.effective_max_pages())
}

async fn run(args: &Args, config: &Config) -> Result<TaskResult> {
    let result = match &args.command {
        Command::Apply {
            kind,
            name,
            params,
            settings,
            set,
            state,
            check,
        } => {
            let adapter = object::adapter(kind)?.as_reconcilable()?;
            let client = connect(args, config)?;
            let desired = DesiredState {
                params: path_params(params),
                name: name.clone(),
                settings: desired_settings(settings.as_deref(), set)?,
            };
            let options = ReconcileOptions { check_mode: *check };
            match object::reconcile(&client, adapter, &desired, (*state).into(), options).await {
                Ok(outcome) => TaskResult::from_outcome(outcome),
                Err(e) => e.into(),
            }
        }
        Command::ApplyList {
            kind,
            names,
            params,
            state,
            check,
        } => {
            let adapter = object::adapter(kind)?;
            let client = connect(args, config)?;
            let options = ListReconcileOptions {
                check_mode: *check,
                max_pages: max_pages(args, config),
            };
            let params = path_params(params);
            match object::reconcile_list(&client, adapter, &params, names, (*state).into(), options)
                .await
            {
                Ok(outcome) => TaskResult::from_list_outcome(outcome),
                Err(e) => e.into(),
            }
        }
        Command::Get {
            kind,
            name,
            params,
            api,
        } => {
            let adapter = object::adapter(kind)?.as_reconcilable()?;
            let client = connect(args, config)?;
            let params = path_params(params);
            match object::get_object(&client, adapter, &params, name, (*api).into()).await {
                Ok(value) => TaskResult::from_value(value),
                Err(e) => e.into(),
            }
        }
        Command::List {
            kind,
            params,
            api,
            where_clauses,
            select,
            count,
        } => {
            let adapter = object::adapter(kind)?.as_listable()?;
            let client = connect(args, config)?;
            let query = ListQuery {
                api: (*api).into(),
                where_clauses: where_clauses.clone(),
                select: select.clone(),
                count: *count,
            };
            let options = ListOptions {
                max_pages: max_pages(args, config),
            };
            match object::list_all(&client, adapter, &path_params(params), &query, options).await {
                Ok(items) => TaskResult::from_list(items),
                Err(e) => e.into(),
            }
        }
        Command::Version => {
            let client = connect(args, config)?;
            match about::semp_version(&client).await {
                Ok(version) => TaskResult::from_value(Value::String(version)),
                Err(e) => e.into(),
            }
        }
        Command::Kinds => TaskResult::from_list(kind_listing()),
    };

    Ok(result)
}

/// One `{kind, display_name}` entry per registered adapter, sorted by kind
fn kind_listing() -> Vec<Value> {
    object::get_registry()
        .iter()
        .map(|(kind, adapter)| json!({"kind": kind, "display_name": adapter.display_name}))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();
    if args.save_config {
        args.connection.apply_to(&mut config);
        config.save().context("failed to save configuration")?;
    }

    let result = match run(&args, &config).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("{:#}", err);
            TaskResult::failed(Value::String(format!("{:#}", err)))
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_failure() {
        std::process::exit(1);
    }

    Ok(())
}

//! ledger-bridge CLI - the bridge as a stdio process
//!
//!   ledger-bridge serve [options]   → read requests from stdin, answer on stdout
//!   ledger-bridge probe [options]   → check the companion app's bridge once
//!
//! Requests and responses are one JSON document per line:
//!   in:  {"target":"BEACON-SDK-LEDGER-BRIDGE","action":"getAddress","params":{},"context":1}
//!   out: {"action":"getAddress","payload":"edpk...","context":1}
//!
//! Logs go to stderr (RUST_LOG, LEDGER_BRIDGE_LOG_JSON=1).

use anyhow::{anyhow, bail, Context, Result};
use ledger_bridge::logging::init_logging;
use ledger_bridge::native::{read_requests, serve, LineOutbox, NativeConnector, WsProbe};
use ledger_bridge::runtime::shutdown_signal;
use ledger_bridge::wallet::LivenessProbe;
use ledger_bridge::{BridgeConfig, DerivationPath, Dispatcher, PollPolicy, TransportMode};
use serde_json::{json, Value};
use std::env;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = match ParsedArgs::parse(&args[1..]) {
        Ok(opts) => opts,
        Err(e) => fail(&e),
    };

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("ledger-bridge {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") => cmd_serve(&opts),
        Some("probe") => cmd_probe(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    match result {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => {}
        Err(e) => fail(&e),
    }
}

fn fail(e: &anyhow::Error) -> ! {
    eprintln!("{}", json!({"error": format!("{:#}", e)}));
    std::process::exit(1);
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    bridge_url: Option<String>,
    target: Option<String>,
    path: Option<String>,
    mode: Option<String>,
    companion_url: Option<String>,
    poll_interval_ms: Option<u64>,
    poll_attempts: Option<u32>,
    probe_timeout_ms: Option<u64>,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut opts = ParsedArgs::default();
        let mut i = 0;

        while i < args.len() {
            let arg = args[i].as_str();
            let mut value = || -> Result<String> {
                i += 1;
                args.get(i).cloned().ok_or_else(|| anyhow!("{} needs a value", arg))
            };
            match arg {
                "-h" | "--help" => opts.help = true,
                "-V" | "--version" => opts.version = true,
                "--bridge-url" => opts.bridge_url = Some(value()?),
                "--target" => opts.target = Some(value()?),
                "--path" => opts.path = Some(value()?),
                "--mode" => opts.mode = Some(value()?),
                "--companion-url" => opts.companion_url = Some(value()?),
                "--poll-interval-ms" => opts.poll_interval_ms = Some(value()?.parse().context("--poll-interval-ms")?),
                "--poll-attempts" => opts.poll_attempts = Some(value()?.parse().context("--poll-attempts")?),
                "--probe-timeout-ms" => opts.probe_timeout_ms = Some(value()?.parse().context("--probe-timeout-ms")?),
                flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
                cmd if opts.command.is_none() => opts.command = Some(cmd.to_string()),
                extra => bail!("Unexpected argument: {}", extra),
            }
            i += 1;
        }

        Ok(opts)
    }

    fn config(&self) -> Result<BridgeConfig> {
        let mut config = BridgeConfig::new();
        if let Some(url) = &self.bridge_url { config = config.with_bridge_url(url); }
        if let Some(target) = &self.target { config = config.with_target(target); }
        if let Some(url) = &self.companion_url { config = config.with_companion_url(url); }
        if let Some(ms) = self.probe_timeout_ms { config = config.with_probe_timeout(Duration::from_millis(ms)); }
        if let Some(raw) = &self.path {
            config = config.with_default_path(DerivationPath::parse(raw).with_context(|| format!("--path {}", raw))?);
        }
        if let Some(mode) = &self.mode {
            config = config.with_mode(TransportMode::from_str(mode).ok_or_else(|| anyhow!("Unknown mode: {} (direct|remote)", mode))?);
        }

        let mut poll = PollPolicy::default();
        if let Some(ms) = self.poll_interval_ms { poll.interval = Duration::from_millis(ms); }
        if let Some(n) = self.poll_attempts { poll.max_attempts = n; }
        Ok(config.with_poll(poll))
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().context("tokio runtime")
}

fn cmd_serve(opts: &ParsedArgs) -> Result<Option<Value>> {
    let config = opts.config()?;
    info!(
        target_id = %config.target,
        mode = config.mode.as_str(),
        bridge = %config.bridge_url,
        path = %config.default_path,
        "ledger-bridge serving on stdio"
    );

    let rt = runtime()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async move {
        let dispatcher = Dispatcher::new(NativeConnector::from_config(&config), LineOutbox::new(std::io::stdout()))
            .with_default_path(config.default_path.clone());
        let requests = read_requests(tokio::io::BufReader::new(tokio::io::stdin()), config.target.clone());
        serve(Rc::new(dispatcher), requests, shutdown_signal()).await;
    });

    debug!("stdio host stopped");
    Ok(None)
}

fn cmd_probe(opts: &ParsedArgs) -> Result<Option<Value>> {
    let config = opts.config()?;
    let probe = WsProbe::new(&config.bridge_url, config.probe_timeout);
    let outcome = runtime()?.block_on(probe.check());

    Ok(Some(match outcome {
        Ok(()) => json!({"alive": true, "url": config.bridge_url}),
        Err(e) => json!({"alive": false, "url": config.bridge_url, "error": e.to_payload()}),
    }))
}

fn print_usage() {
    println!(
        r#"ledger-bridge - relay wallet requests to a hardware wallet

USAGE:
  ledger-bridge <command> [options]

COMMANDS:
  serve     Read requests from stdin (JSON lines), answer on stdout
  probe     Check whether the companion app's bridge is reachable

OPTIONS:
  --bridge-url <url>        Companion bridge WebSocket (default: ws://127.0.0.1:8435)
  --mode <direct|remote>    remote: wait for the companion app before connecting
  --target <id>             Bridge identifier (default: BEACON-SDK-LEDGER-BRIDGE)
  --path <path>             Default derivation path (default: 44'/1729'/0'/0')
  --companion-url <url>     Link shown when asking for the companion app
  --poll-interval-ms <n>    Delay between bridge probes (default: 1000)
  --poll-attempts <n>       Probes before giving up (default: 180)
  --probe-timeout-ms <n>    Connect timeout per probe (default: 500)
  -h, --help                Show this help
  -V, --version             Show version"#
    );
}

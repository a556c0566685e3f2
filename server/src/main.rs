//! Shellbridge binary: picks a mode from argv and runs it to completion. Argument
//! parsing is a manual loop rather than a derive-based CLI crate, matching how small
//! the surface is (a handful of mutually-exclusive flags, one with an optional value).

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use shellbridge_core::{bot, config, daemon, registry, sink};

const DEFAULT_WEB_PORT: u16 = 8080;
const VERSION: &str = env!("CARGO_PKG_VERSION");

enum Mode {
    Version,
    Help,
    Standalone,
    Web { port: u16 },
    Daemon,
    DaemonChild,
    Stop,
    Status,
    Default,
}

const USAGE: &str = "\
Usage: shellbridge [FLAG]

  --standalone        run one PTY session against stdin/stdout, no bridge
  --web [PORT]        serve the browser terminal over HTTP/WebSocket (default port 8080)
  --daemon            fork the Telegram bot bridge into the background
  --stop              stop a backgrounded daemon
  --status            report whether a daemon is running
  --version, -v       print the version
  --help, -h          print this message

With no flag, runs the Telegram bot bridge in the foreground (or first-run setup
if no bot credential is configured yet).";

fn parse_args(args: &[String]) -> Mode {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => return Mode::Version,
            "--help" | "-h" => return Mode::Help,
            "--standalone" => return Mode::Standalone,
            "--web" => {
                let port = args
                    .get(i + 1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_WEB_PORT);
                return Mode::Web { port };
            }
            "--daemon" => return Mode::Daemon,
            daemon::DAEMON_CHILD_FLAG => return Mode::DaemonChild,
            "--stop" => return Mode::Stop,
            "--status" => return Mode::Status,
            _ => {}
        }
        i += 1;
    }
    Mode::Default
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let exit_code = match parse_args(&args) {
        Mode::Version => {
            println!("shellbridge {VERSION}");
            0
        }
        Mode::Help => {
            println!("{USAGE}");
            0
        }
        Mode::Standalone => run_blocking(run_standalone),
        Mode::Web { port } => run_blocking(move || run_web(port)),
        Mode::Daemon => match daemon::start() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("failed to start daemon: {e}");
                1
            }
        },
        Mode::DaemonChild => {
            daemon::run_as_child();
            run_blocking(run_bot_bridge)
        }
        Mode::Stop => match daemon::stop() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("failed to stop daemon: {e}");
                1
            }
        },
        Mode::Status => {
            let status = daemon::status();
            match status.pid {
                Some(pid) if status.running => println!("running (pid {pid})"),
                _ => println!("not running"),
            }
            0
        }
        Mode::Default => run_blocking(run_default),
    };
    std::process::exit(exit_code);
}

type Fatal = Box<dyn std::error::Error + Send + Sync>;

fn run_blocking(f: impl FnOnce() -> Result<(), Fatal>) -> i32 {
    match f() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("fatal: {e}");
            1
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<(), Fatal>>>(fut: F) -> Result<(), Fatal> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(fut)
}

fn run_standalone() -> Result<(), Fatal> {
    block_on(async {
        let (pty, output_rx) = shellbridge_core::pty::spawn()?;
        let sink: sink::DynSink = Arc::new(sink::ConsoleSink::default());
        let streamer_pty = pty.clone();
        tokio::spawn(async move {
            shellbridge_core::streamer::socket::run(streamer_pty, output_rx, sink).await;
        });

        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim() == "/exit" {
                break;
            }
            pty.send_command(&line).await;
        }
        pty.close();
        Ok(())
    })
}

fn run_web(port: u16) -> Result<(), Fatal> {
    block_on(shellbridge_server::run_web_server(port))
}

fn run_bot_bridge() -> Result<(), Fatal> {
    block_on(async {
        let cfg = config::load();
        let Some(token) = cfg.bot_token.clone() else {
            return Err("no bot credential configured; run setup first".into());
        };
        let router = Arc::new(bot::Router::new());
        if cfg.allowed_users.is_empty() {
            let code = router.generate_approval_code();
            println!("Approval code: {code}");
            println!("Send this code to the bot from the Telegram account you want to approve.");
        }
        let config = Arc::new(Mutex::new(cfg));
        let registry = Arc::new(registry::SessionRegistry::new());

        tokio::select! {
            _ = bot::telegram::run(token, config.clone(), registry.clone(), router) => {}
            _ = tokio::signal::ctrl_c() => {
                eprintln!("shutting down");
            }
        }
        registry.close_all();
        Ok(())
    })
}

fn run_default() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config::load();
    if cfg.bot_token.is_none() {
        run_setup()
    } else {
        run_bot_bridge()
    }
}

/// First-run setup: read stdin lines until `/setup <credential>` is entered, persist
/// the credential, then fall straight through to the bot bridge.
fn run_setup() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("No bot credential configured. Enter: /setup <token>");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err("setup aborted (stdin closed)".into());
        }
        let line = line.trim();
        if let Some(token) = line.strip_prefix("/setup ") {
            let token = token.trim();
            if token.is_empty() {
                println!("credential must not be empty");
                continue;
            }
            let mut cfg = config::load();
            cfg.bot_token = Some(token.to_string());
            config::save(&cfg)?;
            println!("Saved. Starting bot bridge.");
            break;
        }
        println!("expected: /setup <token>");
    }
    run_bot_bridge()
}

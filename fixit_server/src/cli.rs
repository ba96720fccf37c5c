use std::{env, env::VarError};

const README: &str = include_str!("./cli-help.txt");

/// Printed with their values. Anything secret belongs in [`SECRET_ENVS`] instead.
const DISPLAY_ENVS: [&str; 14] = [
    "RUST_LOG",
    "FIXIT_HOST",
    "FIXIT_PORT",
    "FIXIT_DATABASE_URL",
    "FIXIT_DB_MAX_CONNECTIONS",
    "FIXIT_RUN_MIGRATIONS",
    "FIXIT_QR_BASE_URL",
    "FIXIT_MERCHANT_ACCOUNT",
    "FIXIT_MERCHANT_BANK",
    "FIXIT_PENDING_TX_MAX_AGE",
    "FIXIT_CLEANUP_INTERVAL",
    "FIXIT_REALTIME_URL",
    "FIXIT_PUSH_URL",
    "FIXIT_EVENT_BUFFER_SIZE",
];

/// Only reported as set or not set.
const SECRET_ENVS: [&str; 1] = ["FIXIT_WEBHOOK_API_KEY"];

/// The server has no real CLI. Any argument at all prints the help text and the current configuration, and the caller
/// should exit. Returns true in that case.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        println!("\n{README}\n");
        println!("{}", describe_environment());
    }
    has_cli_args
}

fn describe_environment() -> String {
    let mut lines = vec![String::from("Current environment values:")];
    for name in DISPLAY_ENVS {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        lines.push(format!("  {name:<35} {val:<15}"));
    }
    for name in SECRET_ENVS {
        let val = if env::var_os(name).is_some() { "Set (hidden)" } else { "Not set" };
        lines.push(format!("  {name:<35} {val:<15}"));
    }
    lines.join("\n")
}

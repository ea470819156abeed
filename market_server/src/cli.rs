use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_GATEWAY_URL",
        "MKT_GATEWAY_MERCHANT_ID",
        "MKT_GATEWAY_TIMEOUT_SECS",
        "MKT_RETURN_URL",
        "MKT_SUCCESS_URL",
        "MKT_CALLBACK_URL",
        "MKT_INVOICE_LIFETIME_MINUTES",
        "MKT_ORDER_FALLBACK_TIMEOUT_MINUTES",
        "MKT_EXPIRY_INTERVAL_SECS",
        "MKT_SETTLEMENT_CURRENCY",
        "MKT_EXCHANGE_RATE_URL",
        "MKT_FALLBACK_RATES",
        "MKT_ADMIN_EMAIL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

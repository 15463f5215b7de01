use std::process::ExitCode;

use crate::cli::{CheckArgs, Cli};

const SHOWN_PREFIX: usize = 10;
const SHOWN_SUFFIX: usize = 4;

/// Keep the first 10 and last 4 characters; shorter values are hidden.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= SHOWN_PREFIX + SHOWN_SUFFIX {
        return "*".repeat(chars.len().max(3));
    }
    let head: String = chars[..SHOWN_PREFIX].iter().collect();
    let tail: String = chars[chars.len() - SHOWN_SUFFIX..].iter().collect();
    format!("{head}...{tail}")
}

/// Offline configuration check; the server is not contacted.
pub fn run(cli: &Cli, args: &CheckArgs) -> ExitCode {
    let mut ok = true;
    println!("\nEnvironment check\n{}", "=".repeat(60));

    match cli.client_config().validate() {
        Ok(()) => println!("✅ AGL_SERVER_URL: {}", cli.server_url),
        Err(e) => {
            ok = false;
            println!("❌ AGL_SERVER_URL: {e}");
        }
    }
    match std::env::var("AGL_WORKER_ID") {
        Ok(id) => println!("✅ AGL_WORKER_ID: {id}"),
        Err(_) => println!("ℹ️  AGL_WORKER_ID: NOT SET (will use default)"),
    }

    for name in &args.required {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => println!("✅ {name}: {}", mask(&value)),
            _ => {
                ok = false;
                println!("❌ {name}: NOT SET");
            }
        }
    }
    println!("{}\n", "=".repeat(60));

    if ok {
        println!("Environment is properly configured.\n");
        ExitCode::SUCCESS
    } else {
        println!("Configuration is incomplete; the worker will fail.\n");
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_secrets() {
        assert_eq!(mask("AIzaSyD-1234567890abcdWXYZ"), "AIzaSyD-12...WXYZ");
    }

    #[test]
    fn hides_short_values_entirely() {
        assert_eq!(mask("secret"), "******");
        assert_eq!(mask("ab"), "***");
    }
}

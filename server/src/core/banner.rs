//! Startup banner and URL display

use super::config::is_all_interfaces;
use super::constants::APP_NAME;
use crate::utils::terminal::{Tone, arrow_line, terminal_link};

/// Label column width; fits "Tracing API:" plus padding
const W: usize = 14;

/// Print the startup banner with URLs
pub fn print_banner(host: &str, port: u16, data_dir: &str, fast_groups: bool) {
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };
    let base = format!("http://{}:{}", display_host, port);

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    let api_url = format!("{}/api/v1/tracing", base);
    let docs_url = format!("{}/api/docs", base);
    println!("{}", arrow_line(Tone::Green, "Tracing API:", &terminal_link(&api_url), W));
    println!("{}", arrow_line(Tone::Yellow, "API docs:", &terminal_link(&docs_url), W));

    if host == "127.0.0.1" || host == "localhost" {
        println!(
            "{}",
            arrow_line(Tone::Dim, "Network:", "use --host 0.0.0.0 to expose", W)
        );
    } else if !is_all_interfaces(host) {
        println!("{}", arrow_line(Tone::Green, "Network:", &terminal_link(&base), W));
    }

    let groups_mode = if fast_groups { "rollup + raw" } else { "raw only" };
    println!("{}", arrow_line(Tone::Dim, "Groups:", groups_mode, W));
    println!("{}", arrow_line(Tone::Dim, "Data:", data_dir, W));

    println!();
}

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

static OPEN_PORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\d+)/tcp\s+open\s+(\S+)").expect("invalid nmap pattern"));

/// Fast nmap sweep of the top ports. Returns (port, service) pairs.
pub async fn scan(host: &str) -> Result<Vec<(u16, String)>> {
    let output = timeout(
        Duration::from_secs(120),
        Command::new("nmap").args(["-T4", "-F"]).arg(host).output(),
    )
    .await
    .context("nmap timed out")?
    .context("failed to spawn nmap")?;

    if !output.status.success() {
        bail!("nmap exited with {}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_open_ports(&stdout))
}

fn parse_open_ports(output: &str) -> Vec<(u16, String)> {
    OPEN_PORT_LINE
        .captures_iter(output)
        .filter_map(|c| {
            let port = c[1].parse().ok()?;
            Some((port, c[2].to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nmap_grepable_lines() {
        let output = "\
Starting Nmap 7.94\n\
PORT     STATE    SERVICE\n\
22/tcp   open     ssh\n\
80/tcp   open     http\n\
443/tcp  closed   https\n\
3306/tcp open     mysql\n";
        let ports = parse_open_ports(output);
        assert_eq!(
            ports,
            vec![
                (22, "ssh".to_string()),
                (80, "http".to_string()),
                (3306, "mysql".to_string())
            ]
        );
    }
}

//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let default_port = settings.server.port;
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, default_port),
        None => (settings.server.host.clone(), default_port),
    };

    println!(
        "{} Starting earnings relay API at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> 127.0.0.1:3030
/// - Just a host: "0.0.0.0" -> 0.0.0.0:<default_port>
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
fn parse_bind_address(bind: &str, default_port: u16) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return ("127.0.0.1".to_string(), port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port);
        }
    }

    (bind.to_string(), default_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(parse_bind_address("8080", 5000), ("127.0.0.1".to_string(), 8080));
        assert_eq!(parse_bind_address("0.0.0.0", 5000), ("0.0.0.0".to_string(), 5000));
        assert_eq!(
            parse_bind_address("localhost:9000", 5000),
            ("localhost".to_string(), 9000)
        );
    }
}

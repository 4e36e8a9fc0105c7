//! tsquery – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging, verbindet sich,
//! waehlt das konfigurierte Ziel aus und fuehrt einen Befehl aus.

use anyhow::Result;
use tsquery_cli::{ausgabe, befehl_aus_argumenten, config::CliConfig, BAUM};
use tsquery_client::{Host, Target};
use tsquery_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("TSQUERY_CONFIG").unwrap_or_else(|_| "tsquery.toml".into());

    let config = CliConfig::laden(&config_pfad)?;
    logging_initialisieren(&config.logging.clone().aus_umgebung()?)?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "tsquery gestartet"
    );

    let argumente: Vec<String> = std::env::args().skip(1).collect();
    let host = Host::connect(&config.verbindung).await?;
    let ziel = host.resolve_target(&config.verbindung).await?;

    let ergebnis = ausfuehren(&host, ziel, &argumente).await;
    if let Err(e) = host.quit().await {
        tracing::debug!(fehler = %e, "Verbindung nicht sauber beendet");
    }
    print!("{}", ergebnis?);
    Ok(())
}

async fn ausfuehren(host: &Host, ziel: Target, argumente: &[String]) -> Result<String> {
    if argumente.first().map(String::as_str) == Some(BAUM) {
        let server = match ziel {
            Target::Server(s) => s,
            Target::Channel(c) => c.server(),
            Target::Client(c) => c.server(),
            Target::Host(_) => {
                anyhow::bail!("'{BAUM}' braucht einen ausgewaehlten Server (server_id, server_port oder server_uid)")
            }
        };
        return Ok(ausgabe::baum_formatieren(&server.channel_tree().await?));
    }

    let cmd = befehl_aus_argumenten(argumente)?;
    let reply = host.execute(&cmd).await?;
    Ok(ausgabe::antwort_formatieren(&reply))
}

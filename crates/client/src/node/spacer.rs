//! Spacer-Channels
//!
//! Ein Spacer traegt Layout-Metadaten im Namen statt in eigenen Feldern:
//!
//! ```text
//! [cspacer3]---
//!  ^^      ^ ^^^
//!  |       | +-- Fuellmuster -> Typ
//!  |       +---- Kennung (frei, macht Namen eindeutig)
//!  +------------ Praefix vor "spacer" -> Ausrichtung
//! ```

use tsquery_protocol::{codes, QueryError, QueryResult};

/// Fuellmuster eines Spacers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacerType {
    Solid = 0,
    Dash = 1,
    Dot = 2,
    DashDot = 3,
    DashDotDot = 4,
    Custom = 5,
}

impl SpacerType {
    pub(crate) fn muster(self) -> &'static str {
        match self {
            Self::Solid => "___",
            Self::Dash => "---",
            Self::Dot => "...",
            Self::DashDot => "-.-",
            Self::DashDotDot => "-..",
            Self::Custom => "",
        }
    }

    fn aus_muster(muster: &str) -> Self {
        match muster {
            "___" => Self::Solid,
            "---" => Self::Dash,
            "..." => Self::Dot,
            "-.-" => Self::DashDot,
            "-.." => Self::DashDotDot,
            _ => Self::Custom,
        }
    }
}

/// Ausrichtung eines Spacers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacerAlign {
    Left = 0,
    Right = 1,
    Center = 2,
    Repeat = 3,
}

impl SpacerAlign {
    pub(crate) fn praefix(self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Right => "r",
            Self::Center => "c",
            Self::Repeat => "*",
        }
    }
}

/// Inhalt der Spacer-Klammer und Text dahinter
///
/// Entspricht dem ersten Treffer von `\[[^\]]*spacer[^\]]*\]`.
fn zerlegen(name: &str) -> Option<(&str, &str)> {
    let mut suche = 0;
    while let Some(auf) = name[suche..].find('[').map(|i| suche + i) {
        let zu = auf + 1 + name[auf + 1..].find(']')?;
        let innen = &name[auf + 1..zu];
        if innen.contains("spacer") {
            return Some((innen, &name[zu + 1..]));
        }
        suche = auf + 1;
    }
    None
}

pub fn ist_spacer(name: &str) -> bool {
    zerlegen(name).is_some()
}

fn kein_spacer() -> QueryError {
    QueryError::server_query(codes::CHANNEL_INVALID_FLAGS, "invalid channel flags")
}

/// Typ aus dem Namen; Fehler 0x307 bei normalen Channels
pub fn typ_aus_namen(name: &str) -> QueryResult<SpacerType> {
    let (_, rest) = zerlegen(name).ok_or_else(kein_spacer)?;
    Ok(SpacerType::aus_muster(rest))
}

/// Ausrichtung aus dem Namen; Fehler 0x307 bei normalen Channels
pub fn ausrichtung_aus_namen(name: &str) -> QueryResult<SpacerAlign> {
    let (innen, _) = zerlegen(name).ok_or_else(kein_spacer)?;
    let praefix = innen.rfind("spacer").map_or("", |pos| &innen[..pos]);
    Ok(match praefix {
        "*" => SpacerAlign::Repeat,
        "c" => SpacerAlign::Center,
        "r" => SpacerAlign::Right,
        _ => SpacerAlign::Left,
    })
}

/// Baut den Channelnamen eines neuen Spacers
pub fn name_bauen(kennung: &str, typ: SpacerType, ausrichtung: SpacerAlign) -> String {
    format!("[{}spacer{kennung}]{}", ausrichtung.praefix(), typ.muster())
}

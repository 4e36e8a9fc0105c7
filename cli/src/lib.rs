//! tsquery-cli – Bibliotheksteil der Kommandozeile
//!
//! Argumente werden 1:1 zu einem ServerQuery-Befehl:
//!
//! ```text
//! tsquery clientlist -uid -away
//! tsquery sendtextmessage targetmode=3 target=1 "msg=Hallo Welt"
//! tsquery tree
//! ```

pub mod ausgabe;
pub mod config;

use tsquery_protocol::{Command, Value};

/// Pseudo-Befehl fuer den Channelbaum des ausgewaehlten Servers
pub const BAUM: &str = "tree";

/// Baut einen Befehl aus Kommandozeilenargumenten
///
/// `key=value` wird Parameter (Wert unveraendert, Escaping erst beim
/// Senden), `-flag` wird Option. Ohne Argumente: `version`.
pub fn befehl_aus_argumenten<I, S>(argumente: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut argumente = argumente.into_iter();
    let Some(verb) = argumente.next() else {
        return Ok(Command::new("version"));
    };
    let verb = verb.as_ref();
    if verb.is_empty() || verb.starts_with('-') || verb.contains('=') {
        anyhow::bail!("Ungueltiger Befehl '{verb}'");
    }

    let mut cmd = Command::new(verb);
    for arg in argumente {
        let arg = arg.as_ref();
        if let Some(flag) = arg.strip_prefix('-') {
            cmd = cmd.option(flag);
        } else if let Some((name, wert)) = arg.split_once('=') {
            cmd = cmd.param(name, Value::from(wert));
        } else {
            // Parameter ohne Wert geht als leerer Wert raus
            cmd = cmd.param(arg, "");
        }
    }
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ohne_argumente_version() {
        let cmd = befehl_aus_argumenten(Vec::<String>::new()).unwrap();
        assert_eq!(cmd.to_wire_line(), "version");
    }

    #[test]
    fn parameter_und_optionen() {
        let cmd = befehl_aus_argumenten(["sendtextmessage", "targetmode=3", "target=1", "msg=Hallo Welt"])
            .unwrap();
        assert_eq!(
            cmd.to_wire_line(),
            r"sendtextmessage targetmode=3 target=1 msg=Hallo\sWelt"
        );

        let cmd = befehl_aus_argumenten(["clientlist", "-uid", "-away"]).unwrap();
        assert_eq!(cmd.to_wire_line(), "clientlist -uid -away");
    }

    #[test]
    fn gleichheitszeichen_im_wert() {
        let cmd = befehl_aus_argumenten(["clientdbfind", "pattern=abc=", "-uid"]).unwrap();
        assert_eq!(cmd.get("pattern"), Some(&Value::from("abc=")));
    }

    #[test]
    fn ungueltiges_verb() {
        assert!(befehl_aus_argumenten(["-uid"]).is_err());
        assert!(befehl_aus_argumenten(["sid=1"]).is_err());
    }
}

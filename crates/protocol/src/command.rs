//! Aufbau von Befehlszeilen
//!
//! ```text
//! <verb> key=escaped(value) ... -option ...
//! ```
//!
//! Parameter erscheinen in Einfuegereihenfolge, `Null`-Werte werden
//! weggelassen. Dieselbe Eingabe ergibt immer dieselbe Zeile.

use std::fmt;

use crate::value::Value;
use crate::wire::escape;

/// Ein ServerQuery-Befehl vor der Serialisierung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    params: Vec<(String, Value)>,
    options: Vec<String>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            params: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Baut einen Befehl aus Verb, Parametern und Optionen
    pub fn from_parts<K, V, O>(
        verb: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
        options: impl IntoIterator<Item = O>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        O: AsRef<str>,
    {
        let mut cmd = Self::new(verb);
        for (k, v) in params {
            cmd = cmd.param(k, v);
        }
        for o in options {
            cmd = cmd.option(o.as_ref());
        }
        cmd
    }

    /// Setzt einen Parameter; ein vorhandener Schluessel wird an Ort und Stelle ersetzt
    pub fn param(mut self, name: impl Into<String>, wert: impl Into<Value>) -> Self {
        self.set(name, wert);
        self
    }

    /// Wie [`param`](Self::param), aber ueber `&mut`
    pub fn set(&mut self, name: impl Into<String>, wert: impl Into<Value>) {
        let name = name.into();
        let wert = wert.into();
        match self.params.iter_mut().find(|(k, _)| *k == name) {
            Some(eintrag) => eintrag.1 = wert,
            None => self.params.push((name, wert)),
        }
    }

    /// Haengt eine `-option` an (mit oder ohne fuehrenden Bindestrich)
    pub fn option(mut self, flag: &str) -> Self {
        let flag = flag.trim_start_matches('-').to_string();
        if !flag.is_empty() && !self.options.contains(&flag) {
            self.options.push(flag);
        }
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn has_option(&self, flag: &str) -> bool {
        self.options.iter().any(|o| o == flag.trim_start_matches('-'))
    }

    /// Serialisiert den Befehl als Zeile (ohne Terminator)
    pub fn to_wire_line(&self) -> String {
        let mut zeile = self.verb.clone();
        for (name, wert) in &self.params {
            if wert.is_null() {
                continue;
            }
            zeile.push(' ');
            zeile.push_str(name);
            zeile.push('=');
            zeile.push_str(&escape(&wert.to_string()));
        }
        for flag in &self.options {
            zeile.push_str(" -");
            zeile.push_str(flag);
        }
        zeile
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nur_verb() {
        assert_eq!(Command::new("whoami").to_wire_line(), "whoami");
    }

    #[test]
    fn parameter_werden_escaped() {
        let cmd = Command::new("clientpoke")
            .param("clid", 5u32)
            .param("msg", "Hallo Welt | a/b");
        assert_eq!(
            cmd.to_wire_line(),
            "clientpoke clid=5 msg=Hallo\\sWelt\\s\\p\\sa\\/b"
        );
    }

    #[test]
    fn null_parameter_fehlen_leere_nicht() {
        let cmd = Command::new("ftgetfilelist")
            .param("cid", 1u32)
            .param("cpw", None::<String>)
            .param("path", "");
        assert_eq!(cmd.to_wire_line(), "ftgetfilelist cid=1 path=");
    }

    #[test]
    fn optionen_am_ende_ohne_duplikate() {
        let cmd = Command::new("clientlist")
            .option("-uid")
            .param("x", 1i64)
            .option("away")
            .option("uid");
        assert_eq!(cmd.to_wire_line(), "clientlist x=1 -uid -away");
        assert!(cmd.has_option("away"));
        assert!(cmd.has_option("-uid"));
    }

    #[test]
    fn parameter_ersetzen_behaelt_position() {
        let cmd = Command::new("use")
            .param("sid", 1u32)
            .param("port", 9987u16)
            .param("sid", 2u32);
        assert_eq!(cmd.to_wire_line(), "use sid=2 port=9987");
    }

    #[test]
    fn from_parts_ist_deterministisch() {
        let a = Command::from_parts(
            "channeledit",
            [("cid", Value::Int(3)), ("channel_name", Value::from("A B"))],
            ["x"],
        );
        let b = Command::from_parts(
            "channeledit",
            [("cid", Value::Int(3)), ("channel_name", Value::from("A B"))],
            ["x"],
        );
        assert_eq!(a.to_wire_line(), b.to_wire_line());
        assert_eq!(a.to_wire_line(), "channeledit cid=3 channel_name=A\\sB -x");
        assert_eq!(a.to_string(), a.to_wire_line());
    }

    #[test]
    fn bool_wird_eins_oder_null() {
        let cmd = Command::new("channeldelete").param("cid", 4u32).param("force", true);
        assert_eq!(cmd.to_wire_line(), "channeldelete cid=4 force=1");
    }
}

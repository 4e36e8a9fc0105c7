//! Textausgabe fuer Antworten und Channelbaum

use tsquery_client::{Node, TreeEntry, TreeNode};
use tsquery_protocol::Reply;

/// Ein Eintrag pro Zeile, Werte entescaped
pub fn antwort_formatieren(reply: &Reply) -> String {
    let mut out = String::new();
    for record in reply.to_table().iter().flatten() {
        let felder: Vec<String> = record
            .fields()
            .iter()
            .map(|f| match &f.value {
                Some(v) => format!("{}={v}", f.name),
                None => f.name.clone(),
            })
            .collect();
        out.push_str(&felder.join(" "));
        out.push('\n');
    }
    out
}

/// Eingerueckter Baum, zwei Leerzeichen pro Ebene
pub fn baum_formatieren(eintraege: &[TreeEntry]) -> String {
    let mut out = String::new();
    for e in eintraege {
        let einzug = "  ".repeat(e.tiefe);
        let zeile = match &e.knoten {
            TreeNode::Channel(c) => format!("#{} {}", c.id(), c.name()),
            TreeNode::Client(c) => format!("- {} (clid {})", c.nickname(), c.id()),
        };
        out.push_str(&einzug);
        out.push_str(&zeile);
        out.push('\n');
    }
    out
}

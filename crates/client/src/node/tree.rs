//! Anzeigereihenfolge von Channels und Channelbaum
//!
//! Geschwister (gleiche `pid`) bilden eine Kette ueber `channel_order`:
//! der Wert ist die ID des vorangehenden Geschwisters, 0 steht vorne.

use std::collections::{BTreeMap, BTreeSet};

use super::channel::Channel;
use super::client::Client;
use super::Node;

/// Position eines Channels im Baum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Einordnung {
    pub cid: u32,
    pub pid: u32,
    pub order: u32,
}

/// Channel-IDs in Anzeigereihenfolge (Tiefensuche)
///
/// Unterbrochene Ketten und verwaiste Channels werden nach ID sortiert
/// hinten angehaengt, es geht kein Channel verloren.
pub(crate) fn anzeige_reihenfolge(channels: &[Einordnung]) -> Vec<u32> {
    let bekannt: BTreeSet<u32> = channels.iter().map(|c| c.cid).collect();
    let mut kinder: BTreeMap<u32, Vec<Einordnung>> = BTreeMap::new();
    for c in channels {
        kinder.entry(c.pid).or_default().push(*c);
    }

    let mut out = Vec::with_capacity(channels.len());
    let mut besucht = BTreeSet::new();
    besuchen(0, &kinder, &mut besucht, &mut out);

    // Channels mit unbekanntem Eltern-Channel
    let mut verwaist: Vec<u32> = channels
        .iter()
        .filter(|c| c.pid != 0 && !bekannt.contains(&c.pid))
        .map(|c| c.cid)
        .collect();
    verwaist.sort_unstable();
    for cid in verwaist {
        if besucht.insert(cid) {
            out.push(cid);
            besuchen(cid, &kinder, &mut besucht, &mut out);
        }
    }

    // Zyklen ueber pid
    for c in channels {
        if besucht.insert(c.cid) {
            out.push(c.cid);
        }
    }
    out
}

fn besuchen(
    pid: u32,
    kinder: &BTreeMap<u32, Vec<Einordnung>>,
    besucht: &mut BTreeSet<u32>,
    out: &mut Vec<u32>,
) {
    let Some(geschwister) = kinder.get(&pid) else {
        return;
    };
    for cid in kette(geschwister) {
        if besucht.insert(cid) {
            out.push(cid);
            besuchen(cid, kinder, besucht, out);
        }
    }
}

fn kette(geschwister: &[Einordnung]) -> Vec<u32> {
    let mut nach_vorgaenger: BTreeMap<u32, u32> = BTreeMap::new();
    for g in geschwister {
        nach_vorgaenger.entry(g.order).or_insert(g.cid);
    }

    let mut out = Vec::with_capacity(geschwister.len());
    let mut gesehen = BTreeSet::new();
    let mut aktuell = 0;
    while let Some(&cid) = nach_vorgaenger.get(&aktuell) {
        if !gesehen.insert(cid) {
            break;
        }
        out.push(cid);
        aktuell = cid;
    }

    let mut rest: Vec<u32> = geschwister
        .iter()
        .map(|g| g.cid)
        .filter(|cid| !gesehen.contains(cid))
        .collect();
    rest.sort_unstable();
    out.extend(rest);
    out
}

/// Ein Knoten im Channelbaum
#[derive(Debug, Clone)]
pub enum TreeNode {
    Channel(Channel),
    Client(Client),
}

/// Eintrag der flachen Baumdarstellung
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// 0 fuer Channels der obersten Ebene
    pub tiefe: usize,
    pub knoten: TreeNode,
}

/// Baut den Baum aus Channels (in Anzeigereihenfolge) und Clients
pub(crate) fn baum(channels: &[Channel], clients: &[Client], clients_zuerst: bool) -> Vec<TreeEntry> {
    let ids: BTreeSet<u32> = channels.iter().map(Node::id).collect();
    let mut unter: BTreeMap<u32, Vec<&Channel>> = BTreeMap::new();
    let mut wurzeln = Vec::new();
    for ch in channels {
        match ch.parent_id() {
            pid if pid != 0 && ids.contains(&pid) => unter.entry(pid).or_default().push(ch),
            _ => wurzeln.push(ch),
        }
    }

    let mut out = Vec::new();
    for ch in wurzeln {
        baum_ebene(ch, 0, &unter, clients, clients_zuerst, &mut out);
    }
    out
}

fn baum_ebene(
    channel: &Channel,
    tiefe: usize,
    unter: &BTreeMap<u32, Vec<&Channel>>,
    clients: &[Client],
    clients_zuerst: bool,
    out: &mut Vec<TreeEntry>,
) {
    out.push(TreeEntry {
        tiefe,
        knoten: TreeNode::Channel(channel.clone()),
    });

    let clients_hier = || {
        clients
            .iter()
            .filter(|c| c.channel_id() == channel.id())
            .map(|c| TreeEntry {
                tiefe: tiefe + 1,
                knoten: TreeNode::Client(c.clone()),
            })
    };

    if clients_zuerst {
        out.extend(clients_hier());
    }
    for kind in unter.get(&channel.id()).into_iter().flatten() {
        baum_ebene(kind, tiefe + 1, unter, clients, clients_zuerst, out);
    }
    if !clients_zuerst {
        out.extend(clients_hier());
    }
}

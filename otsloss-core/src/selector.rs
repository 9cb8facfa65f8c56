//! Connection selection by line-amplifier type.

use crate::models::Connection;
use tracing::{debug, info};

/// Keeps the OTS connections with at least one port label containing
/// `ld_type`.
///
/// Port labels embed the card type (`...-RA2P-LINEIN`), so the match is a
/// case-sensitive substring test. An empty result is not an error.
pub fn select_connections(inventory: &[Connection], ld_type: &str) -> Vec<Connection> {
    let selected: Vec<Connection> = inventory
        .iter()
        .filter(|conn| matches_ld_type(conn, ld_type))
        .cloned()
        .collect();

    info!(
        "Selected {} of {} physical connections for LD type {}",
        selected.len(),
        inventory.len(),
        ld_type
    );
    selected
}

fn matches_ld_type(conn: &Connection, ld_type: &str) -> bool {
    if !conn.is_ots() {
        return false;
    }
    let hit = conn.port_labels().iter().any(|label| label.contains(ld_type));
    if hit {
        debug!("OTS {} matches {}", conn.gui_label, ld_type);
    }
    hit
}

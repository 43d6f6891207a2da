//! Convención de nombres de archivos entre master y workers.
//!
//! - intermedio del map `M` para la partición `R`: `mr-M-R`
//! - salida del reduce de la partición `R`: `mr-out-R`
//!
//! El master nunca abre estos archivos; sólo valida nombres y se los pasa a
//! los reduces.

use std::path::Path;

use crate::task::TaskId;

pub fn intermediate_name(map_id: TaskId, partition: u32) -> String {
    format!("mr-{}-{}", map_id, partition)
}

pub fn output_name(partition: u32) -> String {
    format!("mr-out-{}", partition)
}

/// Último componente de una ruta ("dir/mr-1-2" -> "mr-1-2").
fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Devuelve `(map_id, partition)` si la ruta es un intermedio bien formado.
pub fn parse_intermediate(path: &str) -> Option<(TaskId, u32)> {
    let rest = file_name(path).strip_prefix("mr-")?;
    let (m, r) = rest.split_once('-')?;
    Some((parse_index(m)?, parse_index(r)?))
}

/// Devuelve la partición si la ruta es una salida de reduce bien formada.
pub fn parse_output(path: &str) -> Option<u32> {
    parse_index(file_name(path).strip_prefix("mr-out-")?)
}

// Sólo dígitos decimales: "+1" o "01" no son nombres válidos.
fn parse_index(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

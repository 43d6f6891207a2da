use crate::{KeyValue, Workload};

/// map: parte el contenido en palabras y emite `(palabra, "1")` por cada una.
/// Una palabra es una secuencia de letras, en minúscula.
pub fn map(_filename: &str, contents: &str) -> Vec<KeyValue> {
    contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| KeyValue::new(w.to_lowercase(), "1"))
        .collect()
}

/// reduce: cantidad de apariciones de la palabra.
pub fn reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}

pub fn workload() -> Workload {
    Workload {
        map_fn: map,
        reduce_fn: reduce,
    }
}

//! Ejecución de tareas map y reduce sobre archivos locales.
//!
//! Intermedios: un archivo JSONL por partición (`{"key":..,"value":..}` por
//! línea). Salida: `clave valor` por línea, ordenada por clave.
//! Todo se escribe en un temporal del mismo directorio y se renombra al
//! final, así un reintento reemplaza el archivo completo y nadie ve uno a
//! medio escribir.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::{naming, partition_for, KeyValue, TaskId, Workload};

/// Escribe `name` dentro de `dir` de forma atómica (temporal + rename).
fn write_atomically<F>(dir: &Path, name: &str, fill: F) -> Result<String>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> std::io::Result<()>,
{
    fs::create_dir_all(dir).with_context(|| format!("creando directorio {:?}", dir))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creando temporal en {:?}", dir))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        fill(&mut writer)?;
        writer.flush()?;
    }

    let target = dir.join(name);
    tmp.persist(&target)
        .with_context(|| format!("renombrando temporal a {:?}", target))?;

    Ok(target.to_string_lossy().to_string())
}

/// Corre la función map sobre `input_path` y reparte los pares en
/// `n_reduce` archivos `mr-<map_id>-<R>` dentro de `out_dir`.
///
/// Siempre crea las `n_reduce` particiones, aunque queden vacías.
/// Devuelve las rutas escritas, en orden de partición.
pub fn run_map_task(
    workload: &Workload,
    map_id: TaskId,
    input_path: &str,
    n_reduce: u32,
    out_dir: &Path,
) -> Result<Vec<String>> {
    anyhow::ensure!(n_reduce > 0, "n_reduce debe ser mayor que cero");

    let contents = fs::read_to_string(input_path)
        .with_context(|| format!("leyendo entrada {}", input_path))?;

    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); n_reduce as usize];
    for kv in (workload.map_fn)(input_path, &contents) {
        let pid = partition_for(&kv.key, n_reduce) as usize;
        buckets[pid].push(kv);
    }

    let mut written = Vec::with_capacity(buckets.len());
    for (pid, bucket) in buckets.into_iter().enumerate() {
        let name = naming::intermediate_name(map_id, pid as u32);
        let path = write_atomically(out_dir, &name, |w| {
            for kv in &bucket {
                serde_json::to_writer(&mut *w, kv)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })?;
        written.push(path);
    }

    Ok(written)
}

/// Lee un intermedio JSONL.
pub fn read_intermediate(path: &str) -> Result<Vec<KeyValue>> {
    let file = File::open(path).with_context(|| format!("abriendo intermedio {}", path))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line)
            .with_context(|| format!("línea inválida en {}", path))?;
        out.push(kv);
    }
    Ok(out)
}

/// Agrupa por clave todos los intermedios de la partición, aplica reduce y
/// escribe `mr-out-<partition>` dentro de `out_dir`.
pub fn run_reduce_task(
    workload: &Workload,
    partition: u32,
    input_files: &[String],
    out_dir: &Path,
) -> Result<String> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in input_files {
        for kv in read_intermediate(path)? {
            grouped.entry(kv.key).or_default().push(kv.value);
        }
    }

    let name = naming::output_name(partition);
    write_atomically(out_dir, &name, |w| {
        for (key, values) in &grouped {
            let value = (workload.reduce_fn)(key, values);
            writeln!(w, "{} {}", key, value)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordcount;
    use std::path::PathBuf;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_input(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn run_map_task_crea_todas_las_particiones() {
        let tmp = temp_dir();
        let input = write_input(tmp.path(), "in.txt", "a b a c");
        let out_dir = tmp.path().join("mr");

        let files = run_map_task(
            &wordcount::workload(),
            5,
            input.to_str().unwrap(),
            3,
            &out_dir,
        )
        .unwrap();

        assert_eq!(files.len(), 3);
        for (pid, f) in files.iter().enumerate() {
            assert_eq!(naming::parse_intermediate(f), Some((5, pid as u32)));
            assert!(Path::new(f).exists());
        }

        // todas las apariciones de una clave caen en la misma partición
        let total: usize = files
            .iter()
            .map(|f| read_intermediate(f).unwrap().len())
            .sum();
        assert_eq!(total, 4);
        let pa = partition_for("a", 3) as usize;
        let in_pa = read_intermediate(&files[pa]).unwrap();
        assert_eq!(in_pa.iter().filter(|kv| kv.key == "a").count(), 2);
    }

    #[test]
    fn run_map_task_falla_si_no_existe_la_entrada() {
        let tmp = temp_dir();
        let missing = tmp.path().join("no_existe.txt");
        let res = run_map_task(
            &wordcount::workload(),
            0,
            missing.to_str().unwrap(),
            2,
            tmp.path(),
        );
        assert!(res.is_err());
        assert!(!tmp.path().join("mr-0-0").exists());
    }

    #[test]
    fn map_y_reduce_de_punta_a_punta() {
        let tmp = temp_dir();
        let a = write_input(tmp.path(), "a.txt", "hola mundo hola");
        let b = write_input(tmp.path(), "b.txt", "mundo adios");
        let n_reduce = 2;

        let mut per_partition: Vec<Vec<String>> = vec![Vec::new(); n_reduce as usize];
        for (m, input) in [a, b].iter().enumerate() {
            let files = run_map_task(
                &wordcount::workload(),
                m as TaskId,
                input.to_str().unwrap(),
                n_reduce,
                tmp.path(),
            )
            .unwrap();
            for (pid, f) in files.into_iter().enumerate() {
                per_partition[pid].push(f);
            }
        }

        let mut lines = Vec::new();
        for (pid, inputs) in per_partition.iter().enumerate() {
            let out =
                run_reduce_task(&wordcount::workload(), pid as u32, inputs, tmp.path())
                    .unwrap();
            assert_eq!(naming::parse_output(&out), Some(pid as u32));
            let content = fs::read_to_string(&out).unwrap();
            lines.extend(content.lines().map(str::to_string));
        }
        lines.sort();

        assert_eq!(lines, vec!["adios 1", "hola 2", "mundo 2"]);
    }

    #[test]
    fn reduce_sin_entradas_crea_salida_vacia() {
        let tmp = temp_dir();
        let out = run_reduce_task(&wordcount::workload(), 1, &[], tmp.path()).unwrap();
        assert!(fs::read_to_string(out).unwrap().is_empty());
    }

    #[test]
    fn reintento_de_reduce_reemplaza_la_salida() {
        let tmp = temp_dir();
        let input = write_input(tmp.path(), "in.txt", "x");
        let files =
            run_map_task(&wordcount::workload(), 0, input.to_str().unwrap(), 1, tmp.path())
                .unwrap();

        let first = run_reduce_task(&wordcount::workload(), 0, &files, tmp.path()).unwrap();
        let second = run_reduce_task(&wordcount::workload(), 0, &files, tmp.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(second).unwrap(), "x 1\n");
    }
}

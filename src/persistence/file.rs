use super::{PersistenceResult, PlannerSnapshot, PlannerStore};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub fn save_snapshot_to_json<S, P>(store: &S, path: P) -> PersistenceResult<()>
where
    S: PlannerStore + ?Sized,
    P: AsRef<Path>,
{
    let snapshot = store.snapshot()?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &snapshot)?;
    writer.flush()?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<PlannerSnapshot> {
    let file = File::open(path)?;
    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(snapshot)
}

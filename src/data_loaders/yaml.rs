// ~/vscode-background/src/data_loaders/yaml.rs

use std::{
    fs,
    io,
    path::Path,
};

use serde_yaml::{Mapping, Value};

/// Reads a YAML mapping, distinguishing a missing file from a broken one.
pub fn load_mapping(path: &Path) -> io::Result<Option<Mapping>> {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if txt.trim().is_empty() {
        return Ok(Some(Mapping::new()));
    }

    match serde_yaml::from_str::<Value>(&txt) {
        Ok(Value::Mapping(map)) => Ok(Some(map)),
        Ok(Value::Null) => Ok(Some(Mapping::new())),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not a YAML mapping", path.display()),
        )),
        Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

/// Writes through a sibling temp file so a crash never leaves half a document.
pub fn save_mapping(path: &Path, map: &Mapping) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let txt = serde_yaml::to_string(map).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, txt)?;
    fs::rename(&tmp, path)
}

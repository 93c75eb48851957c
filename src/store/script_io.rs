use std::io::{self, Read};
use std::path::Path;

/// A script together with the name used when reporting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub name: String,
    pub text: String,
}

pub fn load_script(path: &Path) -> Result<ScriptSource, io::Error> {
    Ok(ScriptSource {
        name: path.display().to_string(),
        text: std::fs::read_to_string(path)?,
    })
}

pub fn read_script(reader: &mut impl Read, name: &str) -> Result<ScriptSource, io::Error> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(ScriptSource {
        name: name.to_string(),
        text,
    })
}

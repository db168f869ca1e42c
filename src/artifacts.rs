//! Чтение и запись JSON-артефактов

use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_array(path: impl AsRef<Path>, array: &Array2<f64>) -> Result<()> {
    write_json(path, array)
}

pub fn read_array(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_array_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arr_data").join("x_train.json");
        let array = array![[1.5, -2.0], [0.0, 1e-12]];
        write_array(&path, &array).unwrap();
        assert_eq!(read_array(&path).unwrap(), array);
    }
}

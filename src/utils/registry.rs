// src/utils/registry.rs

use std::{fmt, io::ErrorKind};

use anyhow::{Context, Result};
use winreg::{
    enums::{
        RegType::{REG_DWORD, REG_EXPAND_SZ, REG_SZ},
        HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ,
    },
    RegKey, RegValue,
};

use crate::system::Hive;

/// Registry value types the engine reads and writes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RegistryValue {
    Dword(u32),
    String(String),
}

impl fmt::Display for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryValue::Dword(v) => write!(f, "Dword({})", v),
            RegistryValue::String(v) => write!(f, "String({})", v),
        }
    }
}

fn root(hive: Hive) -> RegKey {
    match hive {
        Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
    }
}

/// Reads a registry value.
///
/// # Returns
///
/// - `Ok(Some(RegistryValue))` if the value exists.
/// - `Ok(None)` if the key or the value doesn't exist.
/// - `Err(anyhow::Error)` on access errors or unsupported value types.
pub fn read_registry_value(hive: Hive, path: &str, name: &str) -> Result<Option<RegistryValue>> {
    let subkey = match root(hive).open_subkey_with_flags(path, KEY_READ) {
        Ok(key) => key,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open subkey '{}\\{}'", hive, path))
        }
    };

    match subkey.get_raw_value(name) {
        Ok(value) => decode(name, value).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read value '{}' in '{}\\{}': {}",
            name,
            hive,
            path,
            e
        )),
    }
}

fn decode(name: &str, value: RegValue) -> Result<RegistryValue> {
    match value.vtype {
        REG_DWORD => {
            if value.bytes.len() >= 4 {
                Ok(RegistryValue::Dword(u32::from_le_bytes([
                    value.bytes[0],
                    value.bytes[1],
                    value.bytes[2],
                    value.bytes[3],
                ])))
            } else {
                anyhow::bail!("REG_DWORD data too small for value '{}'", name);
            }
        }
        REG_SZ | REG_EXPAND_SZ => {
            let wide: Vec<u16> = value
                .bytes
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();
            Ok(RegistryValue::String(
                String::from_utf16_lossy(&wide)
                    .trim_end_matches('\0')
                    .to_string(),
            ))
        }
        other => anyhow::bail!("Unsupported registry value type for '{}': {:?}", name, other),
    }
}

/// Lists every value directly under a key, rendered as text. Value types the
/// engine does not decode show up as their type name in angle brackets.
pub fn list_registry_values(hive: Hive, path: &str) -> Result<Vec<(String, String)>> {
    let subkey = match root(hive).open_subkey_with_flags(path, KEY_READ) {
        Ok(key) => key,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open subkey '{}\\{}'", hive, path))
        }
    };

    let mut values = Vec::new();
    for entry in subkey.enum_values() {
        let (name, raw) =
            entry.with_context(|| format!("Failed to enumerate values of '{}\\{}'", hive, path))?;
        let vtype = raw.vtype.clone();
        let text = match decode(&name, raw) {
            Ok(RegistryValue::Dword(v)) => v.to_string(),
            Ok(RegistryValue::String(s)) => s,
            Err(_) => format!("<{:?}>", vtype),
        };
        values.push((name, text));
    }
    Ok(values)
}

/// Creates or modifies a registry value, creating intermediate keys as needed.
pub fn write_registry_value(hive: Hive, path: &str, name: &str, value: &RegistryValue) -> Result<()> {
    let (key, _) = root(hive)
        .create_subkey(path)
        .with_context(|| format!("Failed to create or open subkey '{}\\{}'", hive, path))?;

    match value {
        RegistryValue::Dword(v) => key
            .set_value(name, v)
            .with_context(|| format!("Failed to set DWORD value '{}' to '{}'", name, v)),
        RegistryValue::String(s) => key
            .set_value(name, s)
            .with_context(|| format!("Failed to set String value '{}' to '{}'", name, s)),
    }
}

/// Deletes a registry value. A value that does not exist counts as deleted.
#[cfg(test)]
fn delete_registry_value(hive: Hive, path: &str, name: &str) -> Result<()> {
    let subkey = match root(hive).open_subkey_with_flags(path, winreg::enums::KEY_WRITE) {
        Ok(key) => key,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open subkey '{}\\{}'", hive, path))
        }
    };

    match subkey.delete_value(name) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to delete registry entry '{}' in '{}': {}",
            name,
            path,
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lazy_static::lazy_static;

    use super::*;

    lazy_static! {
        static ref TEST_MUTEX: Mutex<()> = Mutex::new(());
    }

    const TEST_SUBKEY: &str = "Software\\WinOptRegistryTest";

    #[test]
    fn test_write_read_delete_dword() {
        let _lock = TEST_MUTEX.lock().unwrap();

        let value = RegistryValue::Dword(0xFFFF_FFFF);
        let _ = delete_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestDword");

        write_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestDword", &value)
            .expect("Failed to set DWORD value");
        assert_eq!(
            read_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestDword").unwrap(),
            Some(value)
        );

        delete_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestDword").unwrap();
        assert_eq!(
            read_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestDword").unwrap(),
            None
        );
    }

    #[test]
    fn test_write_read_string() {
        let _lock = TEST_MUTEX.lock().unwrap();

        let value = RegistryValue::String("506".to_string());
        write_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestString", &value).unwrap();
        assert_eq!(
            read_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestString").unwrap(),
            Some(value)
        );
        delete_registry_value(Hive::CurrentUser, TEST_SUBKEY, "TestString").unwrap();
    }

    #[test]
    fn test_list_values_under_key() {
        let _lock = TEST_MUTEX.lock().unwrap();

        let subkey = "Software\\WinOptRegistryTest\\Listing";
        write_registry_value(Hive::CurrentUser, subkey, "Alpha", &RegistryValue::Dword(3)).unwrap();
        write_registry_value(
            Hive::CurrentUser,
            subkey,
            "Beta",
            &RegistryValue::String("C:\\beta.exe".into()),
        )
        .unwrap();

        let mut values = list_registry_values(Hive::CurrentUser, subkey).unwrap();
        values.sort();
        assert_eq!(
            values,
            vec![
                ("Alpha".to_string(), "3".to_string()),
                ("Beta".to_string(), "C:\\beta.exe".to_string()),
            ]
        );

        delete_registry_value(Hive::CurrentUser, subkey, "Alpha").unwrap();
        delete_registry_value(Hive::CurrentUser, subkey, "Beta").unwrap();
        assert!(list_registry_values(Hive::CurrentUser, subkey).unwrap().is_empty());
        assert!(list_registry_values(Hive::CurrentUser, "Software\\WinOptRegistryTest\\Absent")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_key_reads_as_none() {
        let _lock = TEST_MUTEX.lock().unwrap();

        let result = read_registry_value(
            Hive::CurrentUser,
            "Software\\WinOptRegistryTest\\DoesNotExist",
            "Anything",
        )
        .expect("Missing keys should not be an error");
        assert_eq!(result, None);
    }
}

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

mod error;
pub mod fetch;

pub use error::MrpError;
pub use fetch::{Fetched, fetch_text, sha256_hex};

/// A single model run: the `input` section of the request, the model's
/// named files and where outputs go.
pub struct Environment<I = ()> {
    input_json: serde_json::Map<String, Value>,
    pub input: I,
    pub files: HashMap<String, PathBuf>,
    output: Value,
}

impl Environment {
    pub fn from_json(data: Value) -> Self {
        let input_json = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let files = data
            .get("model")
            .and_then(|m| m.get("files"))
            .and_then(|f| f.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), PathBuf::from(s))))
                    .collect()
            })
            .unwrap_or_default();

        let output = data.get("output").cloned().unwrap_or(Value::Null);

        Self {
            input_json,
            input: (),
            files,
            output,
        }
    }

    pub fn from_stdin() -> Result<Self, MrpError> {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, MrpError> {
        if raw.trim().is_empty() {
            return Err(MrpError::EmptyInput);
        }
        let data: Value = serde_json::from_str(raw)?;
        Ok(Self::from_json(data))
    }

    pub fn with_input_type<I: DeserializeOwned>(self) -> Result<Environment<I>, MrpError> {
        let input_value = Value::Object(self.input_json.clone());
        let input = serde_json::from_value(input_value)?;
        Ok(Environment {
            input_json: self.input_json,
            input,
            files: self.files,
            output: self.output,
        })
    }
}

impl<I: DeserializeOwned> Environment<I> {
    pub fn load() -> Result<Self, MrpError> {
        Environment::from_stdin()?.with_input_type::<I>()
    }
}

impl<I> Environment<I> {
    pub fn input_json(&self) -> &serde_json::Map<String, Value> {
        &self.input_json
    }

    pub fn file(&self, key: &str) -> Option<&Path> {
        self.files.get(key).map(PathBuf::as_path)
    }

    /// Parses the TOML file registered under `key`, if the request names one.
    pub fn read_toml<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MrpError> {
        let Some(path) = self.file(key) else {
            return Ok(None);
        };
        debug!("reading {key} from {}", path.display());
        let text = fs::read_to_string(path)?;
        let value = toml::from_str(&text).map_err(|source| MrpError::Toml {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        let output = &self.output;

        // Check flat output
        if output.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return output
                .get("dir")
                .and_then(|v| v.as_str())
                .map(PathBuf::from);
        }

        // Check profiled output, preferring the default profile
        let profile = output
            .get("profile")
            .and_then(|v| v.as_object())
            .and_then(|profiles| profiles.get("default").or_else(|| profiles.values().next()))?;
        if profile.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return profile.get("dir").and_then(|v| v.as_str()).map(PathBuf::from);
        }

        None
    }

    fn create_output(&self, filename: &str) -> Result<Option<fs::File>, MrpError> {
        match self.output_dir() {
            Some(dir) => {
                let path = dir.join(filename);
                fs::create_dir_all(path.parent().unwrap_or(dir.as_path()))?;
                info!("writing {}", path.display());
                Ok(Some(fs::File::create(path)?))
            }
            None => Ok(None),
        }
    }

    pub fn write(&self, filename: &str, data: &[u8]) -> Result<(), MrpError> {
        match self.create_output(filename)? {
            Some(mut file) => file.write_all(data)?,
            None => io::stdout().write_all(data)?,
        }
        Ok(())
    }

    pub fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<(), MrpError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.write(filename, &data)
    }

    pub fn write_csv(
        &self,
        filename: &str,
        headers: &[&str],
        rows: &[Vec<String>],
    ) -> Result<(), MrpError> {
        fn write_all<W: Write>(
            wtr: &mut csv::Writer<W>,
            headers: &[&str],
            rows: &[Vec<String>],
        ) -> Result<(), MrpError> {
            wtr.write_record(headers)?;
            for row in rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
            Ok(())
        }

        match self.create_output(filename)? {
            Some(file) => write_all(&mut csv::Writer::from_writer(file), headers, rows),
            None => write_all(&mut csv::Writer::from_writer(io::stdout()), headers, rows),
        }
    }

    /// Writes serializable records as CSV, one row per record, headers taken
    /// from the field names.
    pub fn write_records<S: Serialize>(&self, filename: &str, records: &[S]) -> Result<(), MrpError> {
        fn write_all<W: Write, S: Serialize>(
            wtr: &mut csv::Writer<W>,
            records: &[S],
        ) -> Result<(), MrpError> {
            for record in records {
                wtr.serialize(record)?;
            }
            wtr.flush()?;
            Ok(())
        }

        match self.create_output(filename)? {
            Some(file) => write_all(&mut csv::Writer::from_writer(file), records),
            None => write_all(&mut csv::Writer::from_writer(io::stdout()), records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_from_json_basic() {
        let data = json!({
            "input": {
                "city": "Lagos",
                "table_modulo": 7
            },
            "model": {
                "files": {
                    "regions": "/tmp/regions.csv"
                }
            },
            "output": {
                "spec": "filesystem",
                "dir": "/tmp/output"
            }
        });
        let env = Environment::from_json(data);
        assert_eq!(env.input_json().get("city").unwrap().as_str().unwrap(), "Lagos");
        assert_eq!(env.input_json().get("table_modulo").unwrap().as_u64().unwrap(), 7);
        assert_eq!(env.file("regions"), Some(Path::new("/tmp/regions.csv")));
        assert_eq!(env.file("config"), None);
        assert_eq!(env.output_dir(), Some(PathBuf::from("/tmp/output")));
    }

    #[test]
    fn test_with_input_type() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Input {
            city: String,
            #[serde(default)]
            table_modulo: Option<u32>,
        }
        let data = json!({
            "input": {
                "city": "Abuja"
            }
        });
        let env = Environment::from_json(data).with_input_type::<Input>().unwrap();
        assert_eq!(
            env.input,
            Input {
                city: "Abuja".to_string(),
                table_modulo: None
            }
        );
    }

    #[test]
    fn test_with_input_type_rejects_bad_input() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Input {
            population: u64,
        }
        let data = json!({ "input": { "population": "many" } });
        let result = Environment::from_json(data).with_input_type::<Input>();
        assert!(matches!(result, Err(MrpError::Json(_))));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Environment::parse("  \n"), Err(MrpError::EmptyInput)));
    }

    #[test]
    fn test_output_dir_profiled() {
        let data = json!({
            "input": {},
            "output": {
                "profile": {
                    "default": {
                        "spec": "filesystem",
                        "dir": "/tmp/profiled"
                    }
                }
            }
        });
        let env = Environment::from_json(data);
        assert_eq!(env.output_dir(), Some(PathBuf::from("/tmp/profiled")));
    }

    #[test]
    fn test_output_dir_none() {
        let data = json!({
            "input": {},
            "output": {
                "spec": "stdout"
            }
        });
        let env = Environment::from_json(data);
        assert_eq!(env.output_dir(), None);
    }

    #[test]
    fn test_defaults() {
        let env = Environment::from_json(json!({}));
        assert!(env.input_json().is_empty());
        assert!(env.files.is_empty());
        assert_eq!(env.output_dir(), None);
    }

    #[test]
    fn test_read_toml() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Config {
            n_days: u32,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chime.toml");
        fs::write(&path, "n_days = 60\n").unwrap();
        let env = Environment::from_json(json!({
            "model": { "files": { "config": path.to_str().unwrap() } }
        }));
        let config: Option<Config> = env.read_toml("config").unwrap();
        assert_eq!(config, Some(Config { n_days: 60 }));
        let missing: Option<Config> = env.read_toml("other").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_read_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "n_days = = 1").unwrap();
        let env = Environment::from_json(json!({
            "model": { "files": { "config": path.to_str().unwrap() } }
        }));
        let err = env.read_toml::<toml::Value>("config").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_write_csv_and_records() {
        #[derive(Serialize)]
        struct Row {
            day: i64,
            hospitalized: u64,
        }
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::from_json(json!({
            "output": { "spec": "filesystem", "dir": dir.path().join("out").to_str().unwrap() }
        }));

        env.write_csv(
            "table.csv",
            &["Day", "Hospitalized"],
            &[vec!["0".to_string(), "3".to_string()]],
        )
        .unwrap();
        env.write_records(
            "records.csv",
            &[
                Row { day: -1, hospitalized: 2 },
                Row { day: 0, hospitalized: 3 },
            ],
        )
        .unwrap();

        let table = fs::read_to_string(dir.path().join("out/table.csv")).unwrap();
        assert_eq!(table, "Day,Hospitalized\n0,3\n");
        let records = fs::read_to_string(dir.path().join("out/records.csv")).unwrap();
        assert_eq!(records, "day,hospitalized\n-1,2\n0,3\n");
    }

    #[test]
    fn test_write_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::from_json(json!({
            "output": { "spec": "filesystem", "dir": dir.path().to_str().unwrap() }
        }));
        env.write("lagos/notes.txt", b"ok").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("lagos/notes.txt")).unwrap(), "ok");
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::from_json(json!({
            "output": { "spec": "filesystem", "dir": dir.path().to_str().unwrap() }
        }));
        env.write_json("summary.json", &json!({ "r_t": 1.5 })).unwrap();
        let written: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(written, json!({ "r_t": 1.5 }));
    }
}

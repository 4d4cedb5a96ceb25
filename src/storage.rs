use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One finished run, as written to the history store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunRecord {
    pub cmd: String,                // Compiled command, single line
    pub returncode: i32,            // Exit code, -1 when killed by a signal
    pub stdout: String,             // Captured standard output
    pub stderr: String,             // Captured standard error
    #[serde(with = "title_bool")]
    pub success: bool,              // returncode == 0
    pub timestamp: DateTime<Local>, // Creation time, also the ordering key
    pub elapsed_time_seconds: f64,  // Wall-clock duration of the run
    #[serde(with = "template_sentinel")]
    pub template_used: Option<String>,
}

impl RunRecord {
    pub fn new(
        cmd: String,
        returncode: i32,
        stdout: String,
        stderr: String,
        timestamp: DateTime<Local>,
        elapsed_time_seconds: f64,
        template_used: Option<String>,
    ) -> Self {
        Self {
            cmd,
            returncode,
            stdout,
            stderr,
            success: returncode == 0,
            timestamp,
            elapsed_time_seconds: elapsed_time_seconds.max(0.0),
            template_used,
        }
    }
}

// Stores written by the earlier tool carry "True"/"False" strings.
mod title_bool {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "True" } else { "False" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "True" => Ok(true),
            "False" => Ok(false),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Str(other),
                &"\"True\" or \"False\"",
            )),
        }
    }
}

mod template_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    // Shared with older history files, so a template literally named
    // "None" reads back as no template.
    const NONE: &str = "None";

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(NONE))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|name| name != NONE))
    }
}

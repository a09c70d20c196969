use serde::{Deserialize, Serialize};

use scenario_parsers::Scenario;

use crate::runner::ParserKind;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub parser: ParserKind,

    #[serde(flatten)]
    pub scenario: ScenarioConfig,

    #[serde(default)]
    pub gc: Option<GcConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub process_name: String,

    #[serde(default)]
    pub pids: Vec<i32>,

    #[serde(default)]
    pub command_line: Option<String>,
}

/// Optional GC wake-up analysis: the pid whose join events to collect
/// and the worker thread ids of the GC thread pool.
#[derive(Debug, Serialize, Deserialize)]
pub struct GcConfig {
    pub pid: i32,
    pub threads: Vec<i32>,
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl ScenarioConfig {
    pub fn to_scenario(&self) -> Scenario {
        let scenario = Scenario::new(self.process_name.clone(), self.pids.clone());
        match &self.command_line {
            Some(command_line) => scenario.with_command_line(command_line.clone()),
            None => scenario,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::io::Write;

    #[rstest]
    fn minimal_config_parses() {
        let config: Config = toml::from_str(
            r#"
            parser = "process-time"
            process_name = "app"
            pids = [10, 11]
            "#,
        )
        .unwrap();

        assert_eq!(config.parser, ParserKind::ProcessTime);
        assert_eq!(config.scenario.process_name, "app");
        assert_eq!(config.scenario.pids, vec![10, 11]);
        assert!(config.scenario.command_line.is_none());
        assert!(config.gc.is_none());
    }

    #[rstest]
    fn gc_section_is_optional_but_parsed() {
        let config: Config = toml::from_str(
            r#"
            parser = "time-to-main"
            process_name = "app"
            command_line = "app --foo"

            [gc]
            pid = 42
            threads = [100, 101, 102]
            "#,
        )
        .unwrap();

        let gc = config.gc.unwrap();
        assert_eq!(gc.pid, 42);
        assert_eq!(gc.threads, vec![100, 101, 102]);
        assert_eq!(config.scenario.command_line.as_deref(), Some("app --foo"));
    }

    #[rstest]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "parser = \"hot-reload\"\nprocess_name = \"app\"").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.parser, ParserKind::HotReload);
        assert!(config.scenario.pids.is_empty());
    }

    #[rstest]
    fn unknown_parser_name_is_rejected() {
        let result = toml::from_str::<Config>(
            r#"
            parser = "frobnicate"
            process_name = "app"
            "#,
        );
        assert!(result.is_err());
    }
}

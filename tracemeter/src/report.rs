use std::io::Write;
use std::path::Path;

use eyre::{Context, Result};
use serde::Serialize;

use gc_join::JoinWakeUpInfo;
use trace_model::Counter;

use crate::runner::ParserKind;

/// The JSON document the binary writes: raw counters plus the optional
/// GC wake-up section. No statistical reduction happens here.
#[derive(Debug, Serialize)]
pub struct Report {
    pub parser: ParserKind,
    pub counters: Vec<Counter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_wakeups: Option<Vec<GcWakeUpReport>>,
}

#[derive(Debug, Serialize)]
pub struct GcWakeUpReport {
    pub join_id: i32,
    pub restart_tid: i32,
    pub last_join_ms: f64,
    pub restart_start_ms: f64,
    pub restart_stop_ms: f64,
    pub wakeups: Vec<ThreadWakeUpReport>,
}

#[derive(Debug, Serialize)]
pub struct ThreadWakeUpReport {
    pub tid: i32,
    pub join_end_ms: f64,
    pub wakeup_ms: f64,
}

impl Report {
    pub fn new(parser: ParserKind, counters: Vec<Counter>) -> Self {
        Report {
            parser,
            counters,
            gc_wakeups: None,
        }
    }

    pub fn with_gc_wakeups(mut self, infos: Vec<JoinWakeUpInfo>) -> Self {
        self.gc_wakeups = Some(infos.into_iter().map(GcWakeUpReport::from).collect());
        self
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create report path={}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl From<JoinWakeUpInfo> for GcWakeUpReport {
    fn from(info: JoinWakeUpInfo) -> Self {
        let mut wakeups: Vec<ThreadWakeUpReport> = info
            .wakeups
            .into_values()
            .map(|w| ThreadWakeUpReport {
                tid: w.tid,
                join_end_ms: w.join_end_ms,
                wakeup_ms: w.wakeup_ms,
            })
            .collect();
        // HashMap order is arbitrary; keep the document stable.
        wakeups.sort_by_key(|w| w.tid);
        GcWakeUpReport {
            join_id: info.join_id,
            restart_tid: info.restart_tid,
            last_join_ms: info.last_join_ms,
            restart_start_ms: info.restart_start_ms,
            restart_stop_ms: info.restart_stop_ms,
            wakeups,
        }
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 特征历史 (Feature History Store)
//!
//! 轨迹ID → 按采集顺序追加的特征记录。会话开始时为空, 结束时整体写出一次快照。

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{FeatureRecord, TrackId};
use crate::error::Result;
use crate::gen_time_string;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureHistory {
    tracks: BTreeMap<TrackId, Vec<FeatureRecord>>,
}

impl FeatureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录, 只能追加到末尾
    pub fn append(&mut self, track: TrackId, record: FeatureRecord) {
        self.tracks.entry(track).or_default().push(record);
    }

    /// 该轨迹最近一条记录 (下一帧求导的基准)
    pub fn latest(&self, track: TrackId) -> Option<&FeatureRecord> {
        self.tracks.get(&track).and_then(|records| records.last())
    }

    pub fn records(&self, track: TrackId) -> &[FeatureRecord] {
        self.tracks.get(&track).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn total_records(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    /// 写出快照 `<dir>/features_YYYYMMDD_HHMMSS.json`, 同名文件存在时追加序号
    pub fn save_snapshot(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let stem = format!("features_{}", gen_time_string("_"));
        let mut path = dir.join(format!("{stem}.json"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{stem}_{n}.json"));
            n += 1;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;

        info!("💾 特征数据已保存: {}", path.display());
        Ok(path)
    }

    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

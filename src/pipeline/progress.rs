// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 采集进度 (operator-facing, 不属于数据契约)

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "Processing... {pos}/{len} frames ({percent}%) [{elapsed_precise}] features collected: {msg}";
const SPINNER_TEMPLATE: &str =
    "{spinner} Processing... {pos} frames [{elapsed_precise}] features collected: {msg}";

pub struct Progress {
    bar: ProgressBar,
    processed: u64,
    total: Option<u64>,
}

impl Progress {
    pub fn new(total: Option<u64>, visible: bool) -> Self {
        let bar = match (visible, total) {
            (false, _) => ProgressBar::hidden(),
            (true, Some(n)) => ProgressBar::new(n),
            (true, None) => ProgressBar::new_spinner(),
        };
        let template = if total.is_some() {
            BAR_TEMPLATE
        } else {
            SPINNER_TEMPLATE
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style);
        }
        bar.set_message("0");
        Self {
            bar,
            processed: 0,
            total,
        }
    }

    pub fn hidden() -> Self {
        Self::new(None, false)
    }

    /// 每处理一帧调用一次 (无论是否检测到目标)
    pub fn advance(&mut self, features_collected: usize) {
        self.processed += 1;
        self.bar.inc(1);
        self.bar.set_message(features_collected.to_string());
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// 完成百分比 (总帧数未知时为 None)
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|&n| n > 0)
            .map(|n| self.processed as f64 / n as f64 * 100.0)
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}

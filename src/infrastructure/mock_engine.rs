//! モックキャプチャエンジン
//!
//! 実機ドライバなしで全フローを動かすための`CaptureEnginePort`実装。
//! 合成された隆線風パターンのフレームを返し、指レイアウト・品質スコア・
//! 障害（open失敗、close失敗、Nフレーム後の取得失敗）をビルダーで
//! 台本化できる。呼び出し回数カウンタは`Arc`で共有され、エンジンを
//! セッションへ渡した後もテストから観測できる。

use crate::domain::{CaptureEnginePort, ScanError, ScanResult, SegmentMeta, SegmentSlot};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// 台本ベースのモックエンジン
pub struct MockEngineAdapter {
    opened: bool,
    score: i32,
    fingers: Vec<SegmentMeta>,
    fail_open: bool,
    fail_close: bool,
    /// このフレーム数を返した後、get_frameが失敗し始める
    frame_fault_after: Option<u64>,
    frames_served: Arc<AtomicU64>,
    beep_count: Arc<AtomicU32>,
    window: (u32, u32, u32, u32),
    dry_wet_level: Option<u32>,
}

impl MockEngineAdapter {
    /// 既定の品質スコア
    pub const DEFAULT_SCORE: i32 = 75;

    /// 指なし・成功のみの既定モックを作成
    pub fn new() -> Self {
        Self {
            opened: false,
            score: Self::DEFAULT_SCORE,
            fingers: Vec::new(),
            fail_open: false,
            fail_close: false,
            frame_fault_after: None,
            frames_served: Arc::new(AtomicU64::new(0)),
            beep_count: Arc::new(AtomicU32::new(0)),
            window: (0, 0, 0, 0),
            dry_wet_level: None,
        }
    }

    /// 品質スコアを固定する
    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    /// 分割結果として返す指レイアウトを設定する
    pub fn with_fingers(mut self, fingers: Vec<SegmentMeta>) -> Self {
        self.fingers = fingers;
        self
    }

    /// openを失敗させる
    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// closeを失敗させる
    pub fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Nフレーム成功後にget_frameを失敗させる
    pub fn with_frame_fault_after(mut self, frames: u64) -> Self {
        self.frame_fault_after = Some(frames);
        self
    }

    /// ビープ回数カウンタの共有ハンドル
    pub fn beep_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.beep_count)
    }

    /// 提供済みフレーム数カウンタの共有ハンドル
    pub fn frames_served(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames_served)
    }

    fn require_open(&self, op: &'static str) -> ScanResult<()> {
        if !self.opened {
            return Err(ScanError::Engine { op, code: -1 });
        }
        Ok(())
    }

    /// 合成隆線パターンを生成する（0x00/0xFFを含まず、構造的空判定を通る）
    fn synth_frame(width: u32, height: u32, seed: u64) -> Vec<u8> {
        let w = width as usize;
        let h = height as usize;
        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let stripe = if (x / 8 + y / 8) % 2 == 0 { 60 } else { 200 };
                let jitter = ((x + y + seed as usize) % 17) as u8;
                data[y * w + x] = stripe + jitter;
            }
        }
        data
    }
}

impl Default for MockEngineAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEnginePort for MockEngineAdapter {
    fn open(&mut self) -> ScanResult<()> {
        if self.fail_open {
            return Err(ScanError::Engine { op: "open", code: 0 });
        }
        // 再openは成功扱い（実ドライバの挙動に合わせる）
        self.opened = true;
        tracing::debug!("Mock engine opened");
        Ok(())
    }

    fn close(&mut self) -> ScanResult<()> {
        if self.fail_close {
            return Err(ScanError::Engine { op: "close", code: 0 });
        }
        self.opened = false;
        tracing::debug!("Mock engine closed");
        Ok(())
    }

    fn set_capture_window(&mut self, x: u32, y: u32, width: u32, height: u32) -> ScanResult<()> {
        self.require_open("set_capture_window")?;
        self.window = (x, y, width, height);
        Ok(())
    }

    fn get_frame(&mut self, width: u32, height: u32) -> ScanResult<Vec<u8>> {
        self.require_open("get_frame")?;

        let served = self.frames_served.load(Ordering::Relaxed);
        if let Some(limit) = self.frame_fault_after {
            if served >= limit {
                return Err(ScanError::Engine {
                    op: "get_frame",
                    code: -2,
                });
            }
        }

        self.frames_served.fetch_add(1, Ordering::Relaxed);
        Ok(Self::synth_frame(width, height, served))
    }

    fn segment(
        &mut self,
        _frame: &[u8],
        _width: u32,
        _height: u32,
        out_width: u32,
        out_height: u32,
        slots: &mut [SegmentSlot],
    ) -> ScanResult<usize> {
        self.require_open("segment")?;

        let count = self.fingers.len().min(slots.len());
        for (i, meta) in self.fingers.iter().take(count).enumerate() {
            slots[i].meta = *meta;
            let sub = Self::synth_frame(out_width, out_height, i as u64);
            slots[i].buffer.copy_from_slice(&sub);
        }
        Ok(count)
    }

    fn score(&mut self, _frame: &[u8], _width: u32, _height: u32) -> ScanResult<i32> {
        self.require_open("score")?;
        Ok(self.score)
    }

    fn set_finger_dry_wet(&mut self, level: u32) -> ScanResult<()> {
        self.require_open("set_finger_dry_wet")?;
        self.dry_wet_level = Some(level);
        tracing::debug!("Mock engine dry/wet level set to {}", level);
        Ok(())
    }

    fn beep(&mut self, times: u32) -> ScanResult<()> {
        self.require_open("beep")?;
        self.beep_count.fetch_add(times, Ordering::Relaxed);
        Ok(())
    }
}

//! 指分割アダプタ
//!
//! Capture Engineに合成フレームの指ごとの分割を依頼し、結果を
//! `FingerRecord`の順序付き集合へマーシャリングする。
//! 呼び出しごとの一時バッファ（出力スロットアリーナ）はこのアダプタが所有し、
//! レコード抽出後はエンジン障害を含むすべての経路で確実に解放される
//! （スコープ所有、RAIIによる解放保証）。

use crate::domain::{
    CaptureEnginePort, FingerRecord, ScanResult, SegmentSlot, SegmentationConfig,
};

/// 指分割アダプタ
///
/// 固定出力サイズとスロット数は設定から決まる（デフォルト300x400、10スロット）。
#[derive(Debug, Clone)]
pub struct SegmentationAdapter {
    config: SegmentationConfig,
}

impl SegmentationAdapter {
    /// 設定から分割アダプタを作成
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// 出力サブ画像の幅
    pub fn out_width(&self) -> u32 {
        self.config.out_width
    }

    /// 出力サブ画像の高さ
    pub fn out_height(&self) -> u32 {
        self.config.out_height
    }

    /// 合成フレームを指ごとの`FingerRecord`に分割する
    ///
    /// エンジンの最大検出数ぶんのスロットを事前確保し、エンジンが返した
    /// 検出数`n`のスロットだけをエンジンの出力順のままレコード化する
    /// （この段階では並べ替えを行わない）。
    ///
    /// # Returns
    /// - `Ok(records)`: 検出された指のレコード。空（n=0）は「指なし」の正常結果
    /// - `Err(ScanError::Engine)`: エンジンが非成功コードを返した
    pub fn split(
        &self,
        engine: &mut dyn CaptureEnginePort,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> ScanResult<Vec<FingerRecord>> {
        let out_w = self.config.out_width;
        let out_h = self.config.out_height;

        // 固定サイズの出力スロットアリーナ（0..max_outputsでインデックス）。
        // この関数を抜けるときにどの経路でもまとめて解放される。
        let mut slots: Vec<SegmentSlot> = (0..self.config.max_outputs)
            .map(|_| SegmentSlot::with_capacity(out_w, out_h))
            .collect();

        let count = engine.segment(frame, width, height, out_w, out_h, &mut slots)?;
        let count = count.min(slots.len());

        tracing::debug!("Finger segmentation returned {} finger(s)", count);

        let records: Vec<FingerRecord> = slots
            .drain(..count)
            .map(|slot| {
                tracing::debug!(
                    "Finger: x={}, y={}, angle={}, quality={}",
                    slot.meta.x,
                    slot.meta.y,
                    slot.meta.angle,
                    slot.meta.quality
                );
                FingerRecord {
                    image_data: slot.buffer,
                    width: out_w,
                    height: out_h,
                    x: slot.meta.x,
                    y: slot.meta.y,
                    top: slot.meta.top,
                    left: slot.meta.left,
                    angle: slot.meta.angle,
                    quality: slot.meta.quality,
                }
            })
            .collect();

        Ok(records)
    }
}

impl Default for SegmentationAdapter {
    fn default() -> Self {
        Self::new(SegmentationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScanError, SegmentMeta};

    /// スロット書き込みを台本どおりに行うテスト用エンジン
    struct ScriptedEngine {
        fingers: Vec<SegmentMeta>,
        fail_code: Option<i32>,
    }

    impl CaptureEnginePort for ScriptedEngine {
        fn open(&mut self) -> ScanResult<()> {
            Ok(())
        }
        fn close(&mut self) -> ScanResult<()> {
            Ok(())
        }
        fn set_capture_window(&mut self, _: u32, _: u32, _: u32, _: u32) -> ScanResult<()> {
            Ok(())
        }
        fn get_frame(&mut self, width: u32, height: u32) -> ScanResult<Vec<u8>> {
            Ok(vec![0u8; (width * height) as usize])
        }
        fn segment(
            &mut self,
            _frame: &[u8],
            _width: u32,
            _height: u32,
            _out_width: u32,
            _out_height: u32,
            slots: &mut [SegmentSlot],
        ) -> ScanResult<usize> {
            if let Some(code) = self.fail_code {
                return Err(ScanError::Engine {
                    op: "segment",
                    code,
                });
            }
            for (i, meta) in self.fingers.iter().enumerate() {
                slots[i].meta = *meta;
                slots[i].buffer.fill(i as u8 + 1);
            }
            Ok(self.fingers.len())
        }
        fn score(&mut self, _: &[u8], _: u32, _: u32) -> ScanResult<i32> {
            Ok(80)
        }
        fn set_finger_dry_wet(&mut self, _: u32) -> ScanResult<()> {
            Ok(())
        }
        fn beep(&mut self, _: u32) -> ScanResult<()> {
            Ok(())
        }
    }

    fn meta(x: i32, angle: i32, quality: i32) -> SegmentMeta {
        SegmentMeta {
            x,
            y: 100,
            top: 10,
            left: 20,
            angle,
            quality,
        }
    }

    #[test]
    fn test_split_extracts_records_in_engine_order() {
        let adapter = SegmentationAdapter::default();
        // エンジンの出力順（X降順）をそのまま保持すること
        let mut engine = ScriptedEngine {
            fingers: vec![meta(500, 320, 75), meta(100, 40, 82)],
            fail_code: None,
        };

        let frame = vec![128u8; 1600 * 1500];
        let records = adapter.split(&mut engine, &frame, 1600, 1500).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].x, 500);
        assert_eq!(records[1].x, 100);
        assert_eq!(records[0].quality, 75);
        assert_eq!(records[1].angle, 40);
        // 各レコードが固定出力サイズの画像を所有している
        assert_eq!(records[0].image_data.len(), 300 * 400);
        assert_eq!(records[0].image_data[0], 1);
        assert_eq!(records[1].image_data[0], 2);
        assert_eq!(records[0].width, 300);
        assert_eq!(records[0].height, 400);
    }

    #[test]
    fn test_split_empty_is_normal_outcome() {
        let adapter = SegmentationAdapter::default();
        let mut engine = ScriptedEngine {
            fingers: Vec::new(),
            fail_code: None,
        };

        let frame = vec![128u8; 1600 * 1500];
        let records = adapter.split(&mut engine, &frame, 1600, 1500).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_split_engine_failure_propagates() {
        let adapter = SegmentationAdapter::default();
        let mut engine = ScriptedEngine {
            fingers: Vec::new(),
            fail_code: Some(-3),
        };

        let frame = vec![128u8; 1600 * 1500];
        let result = adapter.split(&mut engine, &frame, 1600, 1500);
        assert!(matches!(
            result,
            Err(ScanError::Engine { op: "segment", code: -3 })
        ));
    }
}

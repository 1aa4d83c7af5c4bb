//! 画像エンコード
//!
//! 8bitグレースケールの生フレームを256色パレット付きBMPへ変換し、
//! `data:image/bmp;base64,`形式のデータURIとして整形する。
//! 変換はステートレスで、セッション状態に影響しない。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// BMPヘッダ全長（ファイルヘッダ14 + 情報ヘッダ40 + パレット256*4）
const BMP_HEADER_SIZE: usize = 1078;
/// 画素データの開始オフセット
const BMP_DATA_OFFSET: u32 = BMP_HEADER_SIZE as u32;

/// 生グレースケールバッファを8bit BMPへ変換する
///
/// 行は4バイト境界にパディングされ、BMPの慣例どおりボトムアップで
/// 格納される。バッファが`width * height`に満たない場合、不足分は0で
/// 埋められる（呼び出し前にバリデータが長さを保証している前提）。
pub fn raw_to_bmp(raw: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = (w + 3) & !3;
    let image_size = stride * h;

    let mut bmp = vec![0u8; BMP_HEADER_SIZE + image_size];

    // ファイルヘッダ
    bmp[0] = b'B';
    bmp[1] = b'M';
    bmp[2..6].copy_from_slice(&((BMP_HEADER_SIZE + image_size) as u32).to_le_bytes());
    bmp[10..14].copy_from_slice(&BMP_DATA_OFFSET.to_le_bytes());

    // 情報ヘッダ（BITMAPINFOHEADER）
    bmp[14..18].copy_from_slice(&40u32.to_le_bytes());
    bmp[18..22].copy_from_slice(&(width as i32).to_le_bytes());
    bmp[22..26].copy_from_slice(&(height as i32).to_le_bytes());
    bmp[26..28].copy_from_slice(&1u16.to_le_bytes());
    bmp[28..30].copy_from_slice(&8u16.to_le_bytes());
    bmp[34..38].copy_from_slice(&(image_size as u32).to_le_bytes());
    bmp[46..50].copy_from_slice(&256u32.to_le_bytes());

    // グレースケールパレット（B, G, R, 予約）
    for i in 0..256usize {
        let offset = 54 + i * 4;
        bmp[offset] = i as u8;
        bmp[offset + 1] = i as u8;
        bmp[offset + 2] = i as u8;
    }

    // 画素データ: トップダウンの入力をボトムアップへ反転コピー
    for row in 0..h {
        let src_row = h - 1 - row;
        let dst_offset = BMP_HEADER_SIZE + row * stride;
        for col in 0..w {
            bmp[dst_offset + col] = raw.get(src_row * w + col).copied().unwrap_or(0);
        }
    }

    bmp
}

/// BMPバイト列をデータURIへ整形する
pub fn bmp_to_data_uri(bmp: &[u8]) -> String {
    format!("data:image/bmp;base64,{}", STANDARD.encode(bmp))
}

/// 生グレースケールバッファをBMPデータURIへ一括変換する
pub fn raw_to_data_uri(raw: &[u8], width: u32, height: u32) -> String {
    bmp_to_data_uri(&raw_to_bmp(raw, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmp_header_layout() {
        let raw = vec![128u8; 300 * 400];
        let bmp = raw_to_bmp(&raw, 300, 400);

        assert_eq!(&bmp[0..2], b"BM");
        assert_eq!(
            u32::from_le_bytes(bmp[10..14].try_into().unwrap()),
            1078
        );
        assert_eq!(u32::from_le_bytes(bmp[14..18].try_into().unwrap()), 40);
        assert_eq!(i32::from_le_bytes(bmp[18..22].try_into().unwrap()), 300);
        assert_eq!(i32::from_le_bytes(bmp[22..26].try_into().unwrap()), 400);
        assert_eq!(u16::from_le_bytes(bmp[28..30].try_into().unwrap()), 8);
        assert_eq!(bmp.len(), 1078 + 300 * 400);
    }

    #[test]
    fn test_bmp_palette_is_grayscale() {
        let bmp = raw_to_bmp(&[0u8; 16], 4, 4);
        for i in 0..256usize {
            let entry = &bmp[54 + i * 4..54 + i * 4 + 4];
            assert_eq!(entry[0], i as u8);
            assert_eq!(entry[1], i as u8);
            assert_eq!(entry[2], i as u8);
            assert_eq!(entry[3], 0);
        }
    }

    #[test]
    fn test_bmp_rows_are_bottom_up() {
        // 先頭行=1、末尾行=9の4x2画像
        let raw = vec![1, 1, 1, 1, 9, 9, 9, 9];
        let bmp = raw_to_bmp(&raw, 4, 2);
        // BMP側の最初の行は入力の最終行
        assert_eq!(&bmp[1078..1082], &[9, 9, 9, 9]);
        assert_eq!(&bmp[1082..1086], &[1, 1, 1, 1]);
    }

    #[test]
    fn test_bmp_rows_are_padded_to_four_bytes() {
        let raw = vec![7u8; 5 * 2];
        let bmp = raw_to_bmp(&raw, 5, 2);
        // stride = 8
        assert_eq!(bmp.len(), 1078 + 8 * 2);
        assert_eq!(&bmp[1078..1083], &[7, 7, 7, 7, 7]);
        // パディングは0
        assert_eq!(&bmp[1083..1086], &[0, 0, 0]);
    }

    #[test]
    fn test_short_buffer_is_zero_filled() {
        let bmp = raw_to_bmp(&[5u8; 4], 4, 2);
        assert_eq!(bmp.len(), 1078 + 4 * 2);
    }

    #[test]
    fn test_data_uri_format() {
        let uri = raw_to_data_uri(&[128u8; 16], 4, 4);
        assert!(uri.starts_with("data:image/bmp;base64,"));

        let encoded = &uri["data:image/bmp;base64,".len()..];
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(&decoded[0..2], b"BM");
    }
}

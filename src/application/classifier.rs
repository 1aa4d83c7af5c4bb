//! 左右・指名称分類器
//!
//! 分割済み指レコードの幾何学的配置（X/Y座標・回転角・品質）だけから
//! 手の左右と各指の解剖学的名称を推定する決定的ヒューリスティック。
//! デバイスアクセスも可変状態も持たない純粋関数であり、
//! 同じ入力に対して常に同一の結果を返す。
//!
//! # 閾値について
//! 角度レンジ・ギャップ比・信頼度はすべて契約値であり、チューニング候補ではない。
//! テストがこれらの値を固定する。

use crate::domain::{Classification, FingerName, FingerPosition, FingerRecord, HandType};

// 単指: 右に傾いた角度レンジ（左手親指の特徴）
const SINGLE_LEFT_ANGLE_MIN: i32 = 45;
const SINGLE_LEFT_ANGLE_MAX: i32 = 135;
// 単指: 左に傾いた角度レンジ（右手親指の特徴）
const SINGLE_RIGHT_ANGLE_MIN: i32 = 225;
const SINGLE_RIGHT_ANGLE_MAX: i32 = 315;

// 2本指: 左側親指の角度レンジ
const LEFT_THUMB_ANGLE_MIN: i32 = 10;
const LEFT_THUMB_ANGLE_MAX: i32 = 80;
// 2本指: 右側親指の角度レンジ（0-360表現と符号付き表現の両方を受ける）
const RIGHT_THUMB_ANGLE_MIN: i32 = 280;
const RIGHT_THUMB_ANGLE_MAX: i32 = 350;
const RIGHT_THUMB_SIGNED_MIN: i32 = -80;
const RIGHT_THUMB_SIGNED_MAX: i32 = -10;

// 4本指: 最大ギャップが他の平均の何倍なら親指位置とみなすか
const GAP_DOMINANCE_RATIO: f64 = 1.5;
// 4本指: 平均角度によるフォールバックレンジ（度）
const FOUR_ANGLE_LEFT_MIN: f64 = 5.0;
const FOUR_ANGLE_LEFT_MAX: f64 = 15.0;

// 信頼度定数
const CONFIDENCE_NONE: f64 = 0.0;
const CONFIDENCE_SINGLE_TILTED: f64 = 0.6;
const CONFIDENCE_SINGLE_FLAT: f64 = 0.4;
const CONFIDENCE_TWO_THUMBS: f64 = 0.85;
const CONFIDENCE_FOUR_GAP: f64 = 0.85;
const CONFIDENCE_FOUR_ANGLE: f64 = 0.7;
const CONFIDENCE_FIVE_GAP: f64 = 0.9;
const CONFIDENCE_AMBIGUOUS: f64 = 0.6;
const CONFIDENCE_NONSTANDARD: f64 = 0.5;

/// 指レコード集合から手の左右と指名称を分類する
///
/// 入力の順序には依存しない（内部でX座標昇順に整列する）。
pub fn classify(records: &[FingerRecord]) -> Classification {
    if records.is_empty() {
        return Classification::new(HandType::Unknown, CONFIDENCE_NONE, "No finger detected");
    }

    let count = records.len();
    tracing::debug!("Classifying hand layout with {} fingers", count);

    // X座標昇順に整列した参照リスト（以降のすべての分岐と名前割り当てで共有）
    let mut sorted: Vec<&FingerRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.x);

    let mut result = match count {
        1 => classify_single(sorted[0]),
        2 => classify_two_thumbs(&sorted),
        4 => classify_four_fingers(&sorted),
        5 => classify_five_fingers(&sorted),
        n => Classification::new(
            HandType::Unknown,
            CONFIDENCE_NONSTANDARD,
            format!("Non-standard number of fingers: {}", n),
        ),
    };

    result.finger_positions = assign_finger_names(&sorted);

    tracing::info!(
        "Hand classified: {} (confidence: {:.0}%) - {}",
        result.hand_type.description(),
        result.confidence * 100.0,
        result.reason
    );

    result
}

/// 単指の分類（左右の判別は困難、角度を手掛かりにする）
fn classify_single(finger: &FingerRecord) -> Classification {
    // 角度を[0, 360)に正規化
    let angle = ((finger.angle % 360) + 360) % 360;

    if angle > SINGLE_LEFT_ANGLE_MIN && angle < SINGLE_LEFT_ANGLE_MAX {
        // 右に傾いている = 左手親指の可能性が高い
        return Classification::new(
            HandType::Left,
            CONFIDENCE_SINGLE_TILTED,
            format!("Single finger tilted to the right (angle: {} degrees)", angle),
        );
    }
    if angle > SINGLE_RIGHT_ANGLE_MIN && angle < SINGLE_RIGHT_ANGLE_MAX {
        // 左に傾いている = 右手親指の可能性が高い
        return Classification::new(
            HandType::Right,
            CONFIDENCE_SINGLE_TILTED,
            format!("Single finger tilted to the left (angle: {} degrees)", angle),
        );
    }

    Classification::new(
        HandType::Unknown,
        CONFIDENCE_SINGLE_FLAT,
        "Single finger without characteristic inclination",
    )
}

/// 2本親指パターンの分類
///
/// 親指同士は互いに向き合う: 左側親指は右向き（正角）、
/// 右側親指は左向き（負角または280-350度）。
fn classify_two_thumbs(sorted: &[&FingerRecord]) -> Classification {
    let left_angle = sorted[0].angle;
    let right_angle = sorted[1].angle;

    let left_thumb_like =
        left_angle > LEFT_THUMB_ANGLE_MIN && left_angle < LEFT_THUMB_ANGLE_MAX;
    let right_thumb_like = (right_angle > RIGHT_THUMB_ANGLE_MIN
        && right_angle < RIGHT_THUMB_ANGLE_MAX)
        || (right_angle > RIGHT_THUMB_SIGNED_MIN && right_angle < RIGHT_THUMB_SIGNED_MAX);

    if left_thumb_like && right_thumb_like {
        // HandType::Leftは「両手2本親指パターン認識」を意味する
        return Classification::new(
            HandType::Left,
            CONFIDENCE_TWO_THUMBS,
            format!(
                "Two thumbs detected (angles: {} degrees, {} degrees)",
                left_angle, right_angle
            ),
        );
    }

    Classification::new(
        HandType::Unknown,
        CONFIDENCE_AMBIGUOUS,
        "Two fingers with no clear thumb pattern",
    )
}

/// 4本指（親指なし）の分類
///
/// 最大ギャップの位置が親指の欠けた側を示す:
/// 左端ギャップ = 右手（親指が左の枠外）、右端ギャップ = 左手。
fn classify_four_fingers(sorted: &[&FingerRecord]) -> Classification {
    let gaps = consecutive_gaps(sorted);
    let (max_gap_index, max_gap) = max_gap_position(&gaps);

    // 最大値と同値のギャップを除いた平均（同値が複数ある場合はすべて除外される）
    let others: Vec<i32> = gaps.iter().copied().filter(|g| *g != max_gap).collect();
    let avg_gap = if others.is_empty() {
        0.0
    } else {
        others.iter().sum::<i32>() as f64 / others.len() as f64
    };

    // 最大ギャップが他の平均より有意に大きい（> 1.5倍）場合
    if (max_gap as f64) > avg_gap * GAP_DOMINANCE_RATIO {
        if max_gap_index == 0 {
            // 最初の2本の間のギャップ = 右手
            return Classification::new(
                HandType::Right,
                CONFIDENCE_FOUR_GAP,
                "4 fingers with a larger gap on the left (right thumb outside)",
            );
        }
        if max_gap_index == gaps.len() - 1 {
            // 最後の2本の間のギャップ = 左手
            return Classification::new(
                HandType::Left,
                CONFIDENCE_FOUR_GAP,
                "4 fingers with a larger gap on the right (left thumb outside)",
            );
        }
        // 中央位置の最大ギャップからは幾何学的判定を下せない
    }

    // フォールバック: 平均角度による判定
    // 左手の指はわずかに右へ、右手の指はわずかに左へ傾く傾向がある
    let avg_angle =
        sorted.iter().map(|r| r.angle).sum::<i32>() as f64 / sorted.len() as f64;

    if avg_angle > FOUR_ANGLE_LEFT_MIN && avg_angle < FOUR_ANGLE_LEFT_MAX {
        return Classification::new(
            HandType::Left,
            CONFIDENCE_FOUR_ANGLE,
            format!("4 fingers angled to the right (mean angle: {:.1} degrees)", avg_angle),
        );
    }
    if avg_angle < -FOUR_ANGLE_LEFT_MIN && avg_angle > -FOUR_ANGLE_LEFT_MAX {
        return Classification::new(
            HandType::Right,
            CONFIDENCE_FOUR_ANGLE,
            format!("4 fingers angled to the left (mean angle: {:.1} degrees)", avg_angle),
        );
    }

    Classification::new(
        HandType::Unknown,
        CONFIDENCE_AMBIGUOUS,
        "4 fingers with no clear orientation pattern",
    )
}

/// 5本指（全指）の分類
///
/// 親指は他の指から離れて配置されるため、最大ギャップの位置が親指側を示す。
fn classify_five_fingers(sorted: &[&FingerRecord]) -> Classification {
    let gaps = consecutive_gaps(sorted);
    let (max_gap_index, _) = max_gap_position(&gaps);

    if max_gap_index == 0 {
        // 親指が左端 = 左手
        return Classification::new(
            HandType::Left,
            CONFIDENCE_FIVE_GAP,
            "5 fingers with thumb on the left",
        );
    }
    if max_gap_index == gaps.len() - 1 {
        // 親指が右端 = 右手
        return Classification::new(
            HandType::Right,
            CONFIDENCE_FIVE_GAP,
            "5 fingers with thumb on the right",
        );
    }

    Classification::new(
        HandType::Unknown,
        CONFIDENCE_AMBIGUOUS,
        "5 fingers but thumb not clearly identified",
    )
}

/// X昇順リストの隣接ギャップを計算
fn consecutive_gaps(sorted: &[&FingerRecord]) -> Vec<i32> {
    sorted.windows(2).map(|w| w[1].x - w[0].x).collect()
}

/// 最大ギャップの位置と値を取得（同値の場合は先頭側が勝つ）
fn max_gap_position(gaps: &[i32]) -> (usize, i32) {
    let mut max_index = 0;
    let mut max_gap = gaps[0];
    for (i, &gap) in gaps.iter().enumerate().skip(1) {
        if gap > max_gap {
            max_gap = gap;
            max_index = i;
        }
    }
    (max_index, max_gap)
}

/// X昇順の並びに指名称を割り当てる
///
/// 4本・5本の名前順は判定された左右によらず同一
/// （解剖学的には左右で物理順が逆になるはずだが、観測された挙動を
/// そのまま維持している。変更にはプロダクト側の確認が必要）。
fn assign_finger_names(sorted: &[&FingerRecord]) -> Vec<FingerPosition> {
    let names: &[FingerName] = match sorted.len() {
        2 => &[FingerName::Thumb, FingerName::Thumb],
        4 => &[
            FingerName::Index,
            FingerName::Middle,
            FingerName::Ring,
            FingerName::Little,
        ],
        5 => &[
            FingerName::Thumb,
            FingerName::Index,
            FingerName::Middle,
            FingerName::Ring,
            FingerName::Little,
        ],
        // 1本またはその他の本数には名前を割り当てない
        _ => return Vec::new(),
    };

    sorted
        .iter()
        .zip(names)
        .map(|(record, &name)| FingerPosition {
            name,
            x: record.x,
            y: record.y,
            angle: record.angle,
            quality: record.quality,
        })
        .collect()
}

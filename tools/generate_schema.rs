//! JSON Schema + Markdown生成ツール
//!
//! src/domain/config.rsの設定構造から以下を自動生成します：
//! 1. JSON Schema (schema/config.json)
//! 2. Markdownドキュメント (CONFIGURATION.md)
//!
//! 実行方法:
//! ```
//! cargo run --bin generate_schema
//! ```

use schemars::schema_for;
use serde_json::{Map, Value};
use std::fs;
use tenprint::domain::config::AppConfig;

fn main() {
    println!("JSON Schema + Markdown生成中...");

    let schema = schema_for!(AppConfig);
    let json = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema to JSON");

    fs::create_dir_all("schema").expect("Failed to create schema/ directory");
    fs::write("schema/config.json", json.clone()).expect("Failed to write schema/config.json");
    println!("  ✓ schema/config.json");

    let schema_value: Value =
        serde_json::from_str(&json).expect("Failed to parse generated schema");
    let markdown = generate_markdown(&schema_value);

    fs::write("CONFIGURATION.md", markdown).expect("Failed to write CONFIGURATION.md");
    println!("  ✓ CONFIGURATION.md");

    println!("生成完了: schema/config.json + CONFIGURATION.md");
}

/// JSON Schemaからマークダウンドキュメントを生成
fn generate_markdown(schema: &Value) -> String {
    let mut md = String::new();

    md.push_str("# 設定リファレンス (Configuration Reference)\n\n");
    md.push_str("## 概要\n\n");
    md.push_str("`config.toml`ファイルは、tenprintの動作を制御する設定ファイルです。\n\n");
    md.push_str("**設定ファイルの場所**: `config.toml` (プロジェクトルート)  \n");
    md.push_str("**スキーマファイル**: `schema/config.json` (自動生成)  \n");
    md.push_str("**サンプル**: `config.toml.example`\n\n");
    md.push_str("⚠️ **注意**: このドキュメント（CONFIGURATION.md）は `cargo run --bin generate_schema` で自動生成されます。\n");
    md.push_str("設定項目の説明を変更する場合は、`src/domain/config.rs`のdoc commentsを編集してください。\n\n");
    md.push_str("## 設定ファイルの読み込み\n\n");
    md.push_str("- `config.toml`が存在する場合: ファイルから読み込み\n");
    md.push_str("- ファイルが存在しない・パース失敗時: デフォルト値を使用（警告ログ出力）\n\n");
    md.push_str("## 設定項目\n\n");

    let defs = schema
        .get("$defs")
        .and_then(|d| d.as_object())
        .cloned()
        .unwrap_or_default();

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, prop) in props {
            generate_section(&mut md, key, prop, &defs);
        }
    }

    md.push_str("## 参考\n\n");
    md.push_str("- [config.toml.example](config.toml.example) - 設定サンプル\n");

    md
}

/// トップレベルセクション（[device]等）を生成
fn generate_section(md: &mut String, key: &str, schema: &Value, defs: &Map<String, Value>) {
    md.push_str(&format!("### [{}] - {}\n\n", key, section_name(key)));

    let resolved = resolve_ref(schema, defs).unwrap_or(schema);
    if let Some(desc) = resolved.get("description").and_then(|d| d.as_str()) {
        md.push_str(&format!("{}\n\n", desc));
    }

    if let Some(props) = resolved.get("properties").and_then(|p| p.as_object()) {
        md.push_str("| 設定項目 | 型 | 説明 |\n");
        md.push_str("|---------|-----|---------|\n");
        for (prop_key, prop_schema) in props {
            md.push_str(&format!(
                "| `{}` | {} | {} |\n",
                prop_key,
                type_string(prop_schema, defs).replace('|', "\\|"),
                description(prop_schema, defs)
            ));
        }
        md.push('\n');
    }
}

/// `$ref`を`$defs`から解決する
fn resolve_ref<'a>(schema: &'a Value, defs: &'a Map<String, Value>) -> Option<&'a Value> {
    schema
        .get("$ref")
        .and_then(|r| r.as_str())
        .and_then(|r| r.strip_prefix("#/$defs/"))
        .and_then(|name| defs.get(name))
}

/// 型を文字列で取得
fn type_string(schema: &Value, defs: &Map<String, Value>) -> String {
    let resolved = resolve_ref(schema, defs).unwrap_or(schema);

    if resolved.get("enum").is_some() {
        return "enum".to_string();
    }
    if let Some(format) = resolved.get("format").and_then(|f| f.as_str()) {
        return format.to_string();
    }
    match resolved.get("type") {
        Some(Value::String(s)) => s.clone(),
        _ => "unknown".to_string(),
    }
}

/// 説明文を取得（改行・パイプをテーブル向けに整形）
fn description(schema: &Value, defs: &Map<String, Value>) -> String {
    let resolved = resolve_ref(schema, defs).unwrap_or(schema);

    if let Some(desc) = schema
        .get("description")
        .or_else(|| resolved.get("description"))
        .and_then(|d| d.as_str())
    {
        return desc
            .replace("\n\n", "<br><br>")
            .replace('\n', " ")
            .replace('|', "\\|");
    }

    if let Some(enum_vals) = resolved.get("enum").and_then(|e| e.as_array()) {
        let vals: Vec<String> = enum_vals
            .iter()
            .filter_map(|v| v.as_str().map(|s| format!("`{}`", s)))
            .collect();
        if !vals.is_empty() {
            return format!("値: {}", vals.join(", "));
        }
    }

    "-".to_string()
}

/// セクション名をフォーマット
fn section_name(key: &str) -> String {
    match key {
        "device" => "デバイス設定".to_string(),
        "stream" => "ストリーミング設定".to_string(),
        "validator" => "入力検証設定".to_string(),
        "segmentation" => "指分割設定".to_string(),
        "quality" => "品質ゲート設定".to_string(),
        _ => key.to_string(),
    }
}
